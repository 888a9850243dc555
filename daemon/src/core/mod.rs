// Core validation and flow-maintenance subsystem (spec.md's full scope):
// world state, per-pair chains, BlockFlow, the VM-backed tx/block
// validation pipelines, the mempool trait, the event bus, the Storage
// seam, and the Flow Handler that ties all of it into a single-writer
// agent (spec.md §4-§5).

pub mod block_validation;
pub mod blockflow;
pub mod chain;
pub mod error;
pub mod events;
pub mod flow_handler;
pub mod mempool;
pub mod storage;
pub mod tx_validation;
pub mod world_state;
