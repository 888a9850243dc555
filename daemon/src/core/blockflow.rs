// BlockFlow: the aggregate of all G*G per-pair chains, and the only read
// interface validators consume (spec.md §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use blockflow_common::block::{deps_order, Block, BlockHeader};
use blockflow_common::chain_index::ChainIndex;
use blockflow_common::crypto::{Hash, Hashable};
use blockflow_common::difficulty::Target;
use blockflow_common::transaction::Transaction;

use super::chain::{BlockChain, ChainLike, HeaderChain};
use super::mempool::Mempool;
use super::world_state::WorldState;

/// A prepared mining template: the chain this block would extend, the
/// deps it would commit to, the target it must satisfy, and the
/// transactions to include (spec.md §4.6: `prepareBlockFlow`).
#[derive(Debug, Clone)]
pub struct MiningTemplate {
    pub chain_index: ChainIndex,
    pub deps: Vec<Hash>,
    pub target: Target,
    pub transactions: Vec<Arc<Transaction>>,
}

pub struct BlockFlow {
    header_chains: HashMap<ChainIndex, HeaderChain>,
    block_chains: HashMap<ChainIndex, BlockChain>,
    /// A single logical world state shared across all chains, matching
    /// spec.md §3's "WorldState: three logical maps" — there is one set of
    /// live outputs and contract state, not one per chain. `get_trie`'s
    /// "fold the block's deps onto the base persisted state" is therefore
    /// realized as a scratch view over this shared state rather than a
    /// per-chain snapshot merge; see DESIGN.md.
    world_state: WorldState,
}

impl Default for BlockFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockFlow {
    pub fn new() -> Self {
        let mut header_chains = HashMap::new();
        let mut block_chains = HashMap::new();
        for chain_index in ChainIndex::all() {
            header_chains.insert(chain_index, HeaderChain::new());
            block_chains.insert(chain_index, BlockChain::new());
        }
        Self { header_chains, block_chains, world_state: WorldState::new() }
    }

    pub fn get_header_chain(&self, chain_index: &ChainIndex) -> Option<&HeaderChain> {
        self.header_chains.get(chain_index)
    }

    pub fn get_block_chain(&self, chain_index: &ChainIndex) -> Option<&BlockChain> {
        self.block_chains.get(chain_index)
    }

    pub fn world_state(&self) -> &WorldState {
        &self.world_state
    }

    pub fn world_state_mut(&mut self) -> &mut WorldState {
        &mut self.world_state
    }

    /// Whether any chain already has this hash as a header (spec.md §3
    /// invariant 1: a header can be known before its body).
    pub fn contains_header(&self, hash: &Hash) -> bool {
        self.header_chains.values().any(|chain| chain.contains(hash))
    }

    pub fn contains_block(&self, hash: &Hash) -> bool {
        self.block_chains.values().any(|chain| chain.contains(hash))
    }

    /// Subset of `header.parentHash + header.blockDeps` not yet present as
    /// accepted headers (spec.md §4.5 step 2). The all-zero hash marks the
    /// genesis parent/deps slots and is never "missing".
    pub fn missing_deps(&self, header: &BlockHeader) -> Vec<Hash> {
        let mut missing = Vec::new();

        if header.parent_hash != Hash::zero() && !self.contains_header(&header.parent_hash) {
            missing.push(header.parent_hash);
        }
        for dep in &header.block_deps {
            if *dep != Hash::zero() && !self.contains_header(dep) {
                missing.push(*dep);
            }
        }

        missing
    }

    pub fn insert_header(&mut self, chain_index: ChainIndex, header: BlockHeader) -> Option<Hash> {
        self.header_chains.get_mut(&chain_index).map(|chain| chain.insert_header(header))
    }

    pub fn insert_block(&mut self, chain_index: ChainIndex, block: Arc<Block>) -> Option<Hash> {
        let header = block.header().clone();
        self.header_chains.get_mut(&chain_index)?.insert_header(header);
        self.block_chains.get_mut(&chain_index).map(|chain| chain.insert_block(block))
    }

    /// `prepareBlockFlow(chainIndex)`: deps are the current tip of every
    /// other chain, in the canonical `blockDeps` order; the target comes
    /// from `chainIndex`'s own chain retarget; transactions are pulled from
    /// the mempool filtered to `chainIndex`.
    pub fn prepare_block_flow(
        &self,
        chain_index: ChainIndex,
        mempool: &dyn Mempool,
    ) -> Option<MiningTemplate> {
        let own_chain = self.get_block_chain(&chain_index)?;

        let mut deps = Vec::with_capacity(deps_order(chain_index).len());
        for dep_index in deps_order(chain_index) {
            let dep_chain = self.get_block_chain(&dep_index)?;
            deps.push(dep_chain.tip().unwrap_or_else(Hash::zero));
        }

        let target = own_chain.get_hash_target();
        let transactions = mempool.collect_transactions(chain_index);

        Some(MiningTemplate { chain_index, deps, target, transactions })
    }

    /// `getTrie(block)`: the world state a block's transactions should be
    /// validated against — a scratch (copy-on-write) view of the shared
    /// persisted state.
    pub fn get_trie(&self, _block: &Block) -> WorldState {
        self.world_state.cached()
    }

    pub fn block_hash_of(&self, block: &Block) -> Hash {
        block.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_common::chain_index::GroupIndex;
    use blockflow_common::difficulty::max_target;

    #[test]
    fn test_new_blockflow_has_all_chains() {
        let flow = BlockFlow::new();
        for chain_index in ChainIndex::all() {
            assert!(flow.get_header_chain(&chain_index).is_some());
            assert!(flow.get_block_chain(&chain_index).is_some());
        }
    }

    #[test]
    fn test_missing_deps_genesis_header_has_none() {
        let flow = BlockFlow::new();
        let genesis = BlockHeader::genesis(Hash::zero(), 0, max_target());
        assert!(flow.missing_deps(&genesis).is_empty());
    }

    #[test]
    fn test_missing_deps_reports_unseen_parent() {
        let flow = BlockFlow::new();
        let parent = blockflow_common::crypto::hash(b"parent");
        let header = BlockHeader::new(
            parent,
            vec![Hash::zero(); blockflow_common::block::deps_len()],
            blockflow_common::crypto::hash(b"txs"),
            0,
            max_target(),
            0,
        );
        assert_eq!(flow.missing_deps(&header), vec![parent]);
    }

    #[test]
    fn test_insert_header_then_contains() {
        let mut flow = BlockFlow::new();
        let chain_index = ChainIndex::new(GroupIndex::new(0), GroupIndex::new(0));
        let genesis = BlockHeader::genesis(Hash::zero(), 0, max_target());
        let hash = flow.insert_header(chain_index, genesis).unwrap();
        assert!(flow.contains_header(&hash));
    }
}
