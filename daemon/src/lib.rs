// BlockFlow daemon library: the validation and flow-maintenance subsystem
// (spec.md §1), exposed as a library so the binary, benches, and
// integration tests all drive the same `FlowHandler`.

#[macro_use]
extern crate log;

pub mod config;
pub mod core;
pub mod p2p;
