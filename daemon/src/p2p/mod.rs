// Wire message definitions (spec.md §6). The transport itself (TCP framing,
// peer discovery, connection lifecycle) is explicitly out of scope for this
// core (spec.md §1 Non-goal: "networking transport layer"); only the
// message payloads and their encoding live here.

pub mod messages;

pub use messages::{Message, NodeId};
