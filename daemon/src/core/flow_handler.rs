// Flow Handler (spec.md §4.5): the single-writer agent that owns the
// BlockFlow. Accepts AddHeader/AddBlock, buffers items whose deps are not
// yet present, and emits events to peers and the registered miner. Per
// spec.md §5 this is a single-threaded, message-serialized agent — all
// mutation below happens synchronously inside `FlowHandler`'s own methods,
// so no internal locking is needed; `run` is the async actor wrapper a
// binary drives it through (design note §9: "a task per ... flow-handler
// consuming a bounded channel").

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use blockflow_common::block::{Block, BlockHeader};
use blockflow_common::chain_index::ChainIndex;
use blockflow_common::crypto::{Hash, Hashable};
use blockflow_common::network::NetworkId;
use blockflow_common::time::get_current_time_in_millis;
use tokio::sync::{mpsc, oneshot};

use super::block_validation;
use super::blockflow::{BlockFlow, MiningTemplate};
use super::chain::ChainLike;
use super::error::BlockchainError;
use super::events::{EventBus, MinerEvent, Origin, PeerEvent};
use super::mempool::Mempool;
use super::tx_validation::BlockEnvironment;

#[derive(Debug, Clone)]
enum PendingKind {
    Header(BlockHeader),
    Block(Block),
}

#[derive(Debug, Clone)]
struct PendingItem {
    kind: PendingKind,
    chain_index: ChainIndex,
    origin: Origin,
    missing: HashSet<Hash>,
}

/// Serializing owner of the BlockFlow DAG (spec.md §4.5). `pending` is the
/// monotonic-keyed buffer of items awaiting deps, capped at
/// `status_size_limit` with oldest-first eviction (spec.md §5:
/// "drops oldest-first rather than newest-first").
pub struct FlowHandler {
    blockflow: BlockFlow,
    mempool: Box<dyn Mempool>,
    serviced: Vec<ChainIndex>,
    network_id: NetworkId,
    syncing: bool,
    status_size_limit: usize,
    pending: BTreeMap<u64, PendingItem>,
    next_counter: u64,
    event_bus: Arc<dyn EventBus>,
    miner: Option<mpsc::UnboundedSender<MinerEvent>>,
}

impl FlowHandler {
    pub fn new(
        serviced: Vec<ChainIndex>,
        network_id: NetworkId,
        status_size_limit: usize,
        event_bus: Arc<dyn EventBus>,
        mempool: Box<dyn Mempool>,
    ) -> Self {
        Self {
            blockflow: BlockFlow::new(),
            mempool,
            serviced,
            network_id,
            syncing: false,
            status_size_limit,
            pending: BTreeMap::new(),
            next_counter: 0,
            event_bus,
            miner: None,
        }
    }

    pub fn blockflow(&self) -> &BlockFlow {
        &self.blockflow
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn set_syncing(&mut self, syncing: bool) {
        self.syncing = syncing;
    }

    // ===== AddHeader / AddBlock (spec.md §4.5 steps 1-4) =====

    pub fn add_header(&mut self, header: BlockHeader, chain_index: ChainIndex, origin: Origin) -> Result<(), BlockchainError> {
        self.add_header_internal(header, chain_index, origin)
    }

    pub fn add_block(&mut self, block: Block, chain_index: ChainIndex, origin: Origin) -> Result<(), BlockchainError> {
        self.add_block_internal(block, chain_index, origin)
    }

    fn add_header_internal(&mut self, header: BlockHeader, chain_index: ChainIndex, origin: Origin) -> Result<(), BlockchainError> {
        let header_hash = header.hash();
        if self.blockflow.contains_header(&header_hash) {
            return Ok(());
        }

        let missing = self.blockflow.missing_deps(&header);
        if !missing.is_empty() {
            self.park(PendingKind::Header(header), chain_index, origin, missing);
            return Ok(());
        }

        self.validate_and_insert_header(header, chain_index)?;
        self.promote_pending(header_hash);
        Ok(())
    }

    fn add_block_internal(&mut self, block: Block, chain_index: ChainIndex, origin: Origin) -> Result<(), BlockchainError> {
        let block_hash = block.header().hash();
        if self.blockflow.contains_block(&block_hash) {
            return Ok(());
        }

        let missing = self.blockflow.missing_deps(block.header());
        if !missing.is_empty() {
            self.park(PendingKind::Block(block), chain_index, origin, missing);
            return Ok(());
        }

        self.validate_and_insert_block(block, chain_index, origin)?;
        self.promote_pending(block_hash);
        Ok(())
    }

    fn validate_and_insert_header(&mut self, header: BlockHeader, chain_index: ChainIndex) -> Result<(), BlockchainError> {
        let now_ms = get_current_time_in_millis();
        {
            let chain = self
                .blockflow
                .get_header_chain(&chain_index)
                .expect("every ChainIndex has a pre-populated header chain");
            block_validation::validate_header(&header, chain, &self.blockflow, now_ms, self.syncing)?;
        }

        let hash = self
            .blockflow
            .insert_header(chain_index, header)
            .expect("every ChainIndex has a pre-populated header chain");
        log::debug!("header {hash} added to chain {chain_index}");
        Ok(())
    }

    fn validate_and_insert_block(&mut self, block: Block, chain_index: ChainIndex, origin: Origin) -> Result<(), BlockchainError> {
        let mut world = self.blockflow.get_trie(&block);
        let env = BlockEnvironment { network_id: self.network_id, header_timestamp_ms: block.header().timestamp_ms };
        let now_ms = get_current_time_in_millis();

        {
            let chain = self
                .blockflow
                .get_block_chain(&chain_index)
                .expect("every ChainIndex has a pre-populated block chain");
            block_validation::validate_block(
                &block,
                chain_index,
                chain,
                &self.blockflow,
                &self.serviced,
                &env,
                now_ms,
                self.syncing,
                &mut world,
            )?;
        }

        *self.blockflow.world_state_mut() = world;

        let block_arc = Arc::new(block);
        for tx in block_arc.transactions() {
            self.mempool.remove(tx);
        }

        let hash = self
            .blockflow
            .insert_block(chain_index, block_arc.clone())
            .expect("every ChainIndex has a pre-populated block chain");

        let height = self
            .blockflow
            .get_block_chain(&chain_index)
            .and_then(|chain| chain.height(&hash))
            .unwrap_or(0);

        self.event_bus.publish_block_notify(block_arc.header(), height);

        if let Some(miner) = &self.miner {
            let event = match origin {
                Origin::Local => MinerEvent::MinedBlockAdded(chain_index),
                Origin::Remote => MinerEvent::UpdateTemplate,
            };
            let _ = miner.send(event);
        }

        log::debug!("block {hash} added to chain {chain_index} at height {height}");
        Ok(())
    }

    fn park(&mut self, kind: PendingKind, chain_index: ChainIndex, origin: Origin, missing: Vec<Hash>) {
        let counter = self.next_counter;
        self.next_counter += 1;
        self.pending.insert(counter, PendingItem { kind, chain_index, origin, missing: missing.into_iter().collect() });
        self.evict_overflow();
    }

    /// Bounded by `status_size_limit`; the oldest (lowest-counter) entry is
    /// dropped first on overflow (spec.md §4.5, §5).
    fn evict_overflow(&mut self) {
        while self.pending.len() > self.status_size_limit {
            if let Some((&oldest, _)) = self.pending.iter().next() {
                self.pending.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Walks the pending buffer removing `newly_added` from every item's
    /// missing-deps set; any item that becomes fully satisfied is promoted,
    /// oldest first. A rejected promoted item is logged and dropped, never
    /// propagated as a fatal error (spec.md §7 propagation policy).
    fn promote_pending(&mut self, newly_added: Hash) {
        let mut ready = Vec::new();
        for (&counter, item) in self.pending.iter_mut() {
            item.missing.remove(&newly_added);
            if item.missing.is_empty() {
                ready.push(counter);
            }
        }
        ready.sort_unstable();

        for counter in ready {
            let Some(item) = self.pending.remove(&counter) else { continue };
            let result = match item.kind {
                PendingKind::Header(header) => self.add_header_internal(header, item.chain_index, item.origin),
                PendingKind::Block(block) => self.add_block_internal(block, item.chain_index, item.origin),
            };
            if let Err(err) = result {
                log::warn!("promoted pending item rejected: {err}");
            }
        }
    }

    // ===== Read-side commands (spec.md §4.5/§6) =====

    fn find_block(&self, hash: &Hash) -> Option<Arc<Block>> {
        ChainIndex::all().into_iter().find_map(|idx| self.blockflow.get_block_chain(&idx)?.block(hash).cloned())
    }

    fn find_header(&self, hash: &Hash) -> Option<BlockHeader> {
        ChainIndex::all().into_iter().find_map(|idx| self.blockflow.get_header_chain(&idx)?.header(hash).cloned())
    }

    fn find_header_height(&self, hash: &Hash) -> Option<u64> {
        ChainIndex::all().into_iter().find_map(|idx| self.blockflow.get_header_chain(&idx)?.height(hash))
    }

    pub fn get_blocks(&self, locators: &[Hash]) -> Vec<Arc<Block>> {
        locators.iter().filter_map(|hash| self.find_block(hash)).collect()
    }

    pub fn get_headers(&self, locators: &[Hash]) -> Vec<BlockHeader> {
        locators.iter().filter_map(|hash| self.find_header(hash)).collect()
    }

    pub fn get_sync_info(&self, remote: &[Hash], same_clique: bool) -> PeerEvent {
        let remote_height = remote.iter().filter_map(|hash| self.find_header_height(hash)).max().unwrap_or(0);
        PeerEvent::SyncInfo { remote_height, same_clique }
    }

    pub fn get_sync_data(&self, block_locators: &[Hash], header_locators: &[Hash]) -> PeerEvent {
        PeerEvent::SyncData { blocks: self.get_blocks(block_locators), headers: self.get_headers(header_locators) }
    }

    pub fn prepare_block_flow(&self, chain_index: ChainIndex) -> Option<MiningTemplate> {
        self.blockflow.prepare_block_flow(chain_index, self.mempool.as_ref())
    }

    pub fn register_miner(&mut self, miner: mpsc::UnboundedSender<MinerEvent>) {
        self.miner = Some(miner);
    }

    pub fn unregister_miner(&mut self) {
        self.miner = None;
    }
}

/// The commands spec.md §4.5 names, for driving a `FlowHandler` through a
/// bounded channel from an async context (peer connections, the RPC layer,
/// the miner).
pub enum Command {
    AddHeader { header: BlockHeader, chain_index: ChainIndex, origin: Origin },
    AddBlock { block: Block, chain_index: ChainIndex, origin: Origin },
    GetBlocks { locators: Vec<Hash>, reply: oneshot::Sender<Vec<Arc<Block>>> },
    GetHeaders { locators: Vec<Hash>, reply: oneshot::Sender<Vec<BlockHeader>> },
    GetSyncInfo { remote: Vec<Hash>, same_clique: bool, reply: oneshot::Sender<PeerEvent> },
    GetSyncData { block_locators: Vec<Hash>, header_locators: Vec<Hash>, reply: oneshot::Sender<PeerEvent> },
    PrepareBlockFlow { chain_index: ChainIndex, reply: oneshot::Sender<Option<MiningTemplate>> },
    Register { miner: mpsc::UnboundedSender<MinerEvent> },
    UnRegister,
}

/// Drains `commands` until the sender side closes. This is the task body a
/// per-broker flow handler runs in (spec.md §5: single-threaded,
/// message-serialized; §9: "a task per ... flow-handler consuming a
/// bounded channel").
pub async fn run(mut handler: FlowHandler, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::AddHeader { header, chain_index, origin } => {
                if let Err(err) = handler.add_header(header, chain_index, origin) {
                    log::warn!("rejected header: {err}");
                }
            }
            Command::AddBlock { block, chain_index, origin } => {
                if let Err(err) = handler.add_block(block, chain_index, origin) {
                    log::warn!("rejected block: {err}");
                }
            }
            Command::GetBlocks { locators, reply } => {
                let _ = reply.send(handler.get_blocks(&locators));
            }
            Command::GetHeaders { locators, reply } => {
                let _ = reply.send(handler.get_headers(&locators));
            }
            Command::GetSyncInfo { remote, same_clique, reply } => {
                let _ = reply.send(handler.get_sync_info(&remote, same_clique));
            }
            Command::GetSyncData { block_locators, header_locators, reply } => {
                let _ = reply.send(handler.get_sync_data(&block_locators, &header_locators));
            }
            Command::PrepareBlockFlow { chain_index, reply } => {
                let _ = reply.send(handler.prepare_block_flow(chain_index));
            }
            Command::Register { miner } => handler.register_miner(miner),
            Command::UnRegister => handler.unregister_miner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_common::crypto::hash;
    use blockflow_common::difficulty::max_target;

    use super::super::events::RecordingEventBus;
    use super::super::mempool::SimpleMempool;

    fn handler(status_size_limit: usize) -> FlowHandler {
        FlowHandler::new(
            ChainIndex::all(),
            NetworkId::Testnet,
            status_size_limit,
            Arc::new(RecordingEventBus::new()),
            Box::new(SimpleMempool::new()),
        )
    }

    fn header_with_parent(parent_hash: Hash, timestamp_ms: u64) -> BlockHeader {
        BlockHeader::new(
            parent_hash,
            vec![Hash::zero(); blockflow_common::block::deps_len()],
            hash(b"txs"),
            timestamp_ms,
            max_target(),
            0,
        )
    }

    /// Scenario 6 (spec.md §8): add block B whose deps include an unseen
    /// hash H — buffer size 0 -> 1. Add the header with hash H — buffer
    /// returns to 0 and B is accepted.
    #[test]
    fn test_scenario_6_pending_promotion() {
        let mut handler = handler(10);
        // Historical-looking timestamps (genesis at 0, child at 1000) are
        // only accepted from a syncing node per the skew rule in
        // `block_validation::validate_timestamp` — this scenario is exactly
        // that bootstrap-from-genesis case.
        handler.set_syncing(true);
        let chain_index = ChainIndex::new(
            blockflow_common::chain_index::GroupIndex::new(0),
            blockflow_common::chain_index::GroupIndex::new(0),
        );

        let genesis = BlockHeader::genesis(hash(b"txs"), 0, max_target());
        let genesis_hash = genesis.hash();

        let child = header_with_parent(genesis_hash, 1000);
        let child_hash = child.hash();

        handler.add_header(child, chain_index, Origin::Remote).unwrap();
        assert_eq!(handler.pending_len(), 1);
        assert!(!handler.blockflow().contains_header(&child_hash));

        handler.add_header(genesis, chain_index, Origin::Remote).unwrap();
        assert_eq!(handler.pending_len(), 0);
        assert!(handler.blockflow().contains_header(&child_hash));
    }

    /// Scenario 7 (spec.md §8): with `statusSizeLimit = 2`, three pending
    /// headers with independent missing deps are added; the oldest is
    /// evicted; size stays at 2.
    #[test]
    fn test_scenario_7_pending_overflow_evicts_oldest() {
        let mut handler = handler(2);
        let chain_index = ChainIndex::new(
            blockflow_common::chain_index::GroupIndex::new(0),
            blockflow_common::chain_index::GroupIndex::new(0),
        );

        let first = header_with_parent(hash(b"missing-1"), 1);
        let first_hash = first.hash();
        let second = header_with_parent(hash(b"missing-2"), 2);
        let third = header_with_parent(hash(b"missing-3"), 3);
        let third_hash = third.hash();

        handler.add_header(first, chain_index, Origin::Remote).unwrap();
        handler.add_header(second, chain_index, Origin::Remote).unwrap();
        handler.add_header(third, chain_index, Origin::Remote).unwrap();

        assert_eq!(handler.pending_len(), 2);
        assert!(!handler.pending.values().any(|item| matches!(
            &item.kind,
            PendingKind::Header(header) if header.hash() == first_hash
        )));
        assert!(handler.pending.values().any(|item| matches!(
            &item.kind,
            PendingKind::Header(header) if header.hash() == third_hash
        )));
    }

    #[test]
    fn test_reinsert_accepted_header_is_noop() {
        let mut handler = handler(10);
        let chain_index = ChainIndex::new(
            blockflow_common::chain_index::GroupIndex::new(0),
            blockflow_common::chain_index::GroupIndex::new(0),
        );
        let genesis = BlockHeader::genesis(hash(b"txs"), 0, max_target());

        handler.add_header(genesis.clone(), chain_index, Origin::Remote).unwrap();
        assert!(handler.blockflow().contains_header(&genesis.hash()));

        handler.add_header(genesis, chain_index, Origin::Remote).unwrap();
        assert_eq!(handler.pending_len(), 0);
    }

    #[test]
    fn test_get_headers_returns_known_only() {
        let mut handler = handler(10);
        let chain_index = ChainIndex::new(
            blockflow_common::chain_index::GroupIndex::new(0),
            blockflow_common::chain_index::GroupIndex::new(0),
        );
        let genesis = BlockHeader::genesis(hash(b"txs"), 0, max_target());
        let genesis_hash = genesis.hash();
        handler.add_header(genesis, chain_index, Origin::Remote).unwrap();

        let found = handler.get_headers(&[genesis_hash, hash(b"unknown")]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hash(), genesis_hash);
    }
}
