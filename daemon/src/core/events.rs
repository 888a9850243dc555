// Event bus (spec.md §4.5, §6): the Flow Handler publishes `BlockAdded` /
// `HeaderAdded` internally and `BlockNotify` to the bus every external
// collaborator (RPC subscribers, metrics) listens on. The bus itself is an
// external collaborator (spec.md §6: "a publish interface accepting
// BlockNotify") — this module only defines the event payloads and the
// publish seam, not a concrete transport.

use std::sync::Arc;

use blockflow_common::block::{Block, BlockHeader};
use blockflow_common::chain_index::ChainIndex;
use blockflow_common::crypto::Hash;

/// Where an `AddHeader`/`AddBlock` command originated. `MinedBlockAdded` is
/// only sent to the miner when `origin == Local` (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Internal bookkeeping events the Flow Handler raises on every successful
/// insertion (spec.md §4.5).
#[derive(Debug, Clone)]
pub enum FlowEvent {
    BlockAdded { chain_index: ChainIndex, block: Arc<Block>, height: u64 },
    HeaderAdded { chain_index: ChainIndex, header: BlockHeader, height: u64 },
    /// Published to the event bus every time a block is newly accepted.
    BlockNotify { header: BlockHeader, height: u64 },
}

/// Replies the Flow Handler owes a requesting peer (spec.md §4.5/§6).
#[derive(Debug, Clone)]
pub enum PeerEvent {
    BlocksLocated(Vec<Arc<Block>>),
    SendHeaders(Vec<BlockHeader>),
    SyncInfo { remote_height: u64, same_clique: bool },
    SyncData { blocks: Vec<Arc<Block>>, headers: Vec<BlockHeader> },
}

/// What the registered miner receives (spec.md §4.5/§6): a template refresh
/// on every accepted block elsewhere in the DAG, or a confirmation of its
/// own mined block landing.
#[derive(Debug, Clone)]
pub enum MinerEvent {
    UpdateTemplate,
    MinedBlockAdded(ChainIndex),
}

/// Publish seam for `BlockNotify` and friends. A concrete bus (pubsub over a
/// channel, a websocket fanout) is an external collaborator; the Flow
/// Handler only needs something it can push events into.
pub trait EventBus: Send + Sync {
    fn publish_block_notify(&self, header: &BlockHeader, height: u64);
}

/// A bus that records every notification it receives, for tests and for any
/// binary that has no real subscriber wiring yet.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    notifications: std::sync::Mutex<Vec<(Hash, u64)>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(Hash, u64)> {
        self.notifications.lock().expect("event bus mutex poisoned").clone()
    }
}

impl EventBus for RecordingEventBus {
    fn publish_block_notify(&self, header: &BlockHeader, height: u64) {
        use blockflow_common::crypto::Hashable;
        self.notifications
            .lock()
            .expect("event bus mutex poisoned")
            .push((header.hash(), height));
    }
}
