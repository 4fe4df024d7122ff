//! # knode-types
//!
//! Shared domain types for the knode Kademlia DHT workspace: the 160-bit
//! identifier algebra and the peer [`Contact`] record. These are used by
//! every other crate in the workspace, from the datagram transport up
//! through the routing table and the daemon binary.

pub mod contact;
pub mod id;

pub use contact::Contact;
pub use id::{IdError, NodeId, ID_LEN};
