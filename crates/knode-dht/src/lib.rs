//! # knode-dht
//!
//! Core Kademlia logic for the knode distributed hash table: the routing
//! table, the in-memory value store, the iterative node-lookup procedure,
//! the RPC dispatcher and handlers, and the bootstrap/join sequence.
//!
//! ## Key parameters
//!
//! | Parameter | Value |
//! |---|---|
//! | K (bucket size) | 20 |
//! | alpha (lookup parallelism) | 3 |
//! | Buckets | 160 (one per bit of the node id space) |
//! | Ping / request timeout | 5 seconds |
//! | Ephemeral port pool size | 100 |
//! | Node id derivation | random at startup, or fixed for the bootstrap node |
//! | Value id derivation | `SHA-1(value bytes)` |

pub mod dispatcher;
pub mod handlers;
pub mod join;
pub mod lookup;
pub mod node;
pub mod routing;
pub mod rpc;
pub mod store;

/// Kademlia bucket size: maximum contacts per bucket.
pub const K: usize = 20;

/// Lookup parallelism factor.
pub const ALPHA: usize = 3;

/// Number of buckets in the routing table, one per bit of the node id space.
pub const NUM_BUCKETS: usize = knode_types::ID_LEN * 8;

/// Timeout, in seconds, for a single request/response round trip.
pub const PING_TIMEOUT_SECS: u64 = 5;

/// Default size of the ephemeral port pool used for outbound requests.
pub const EPHEMERAL_POOL_SIZE: u16 = 100;

/// Error types for DHT operations.
#[derive(Debug, thiserror::Error)]
pub enum DhtError {
    /// No contact in the routing table is closer to the target than this
    /// node itself.
    #[error("no closer node found")]
    NoCloserNode,

    /// The routing table holds no contacts at all.
    #[error("no closest node found")]
    NoContactsKnown,

    /// The requested value was not found locally.
    #[error("value not found")]
    ValueNotFound,

    /// The underlying transport failed (timeout, I/O, oversized datagram...).
    #[error("transport error: {0}")]
    Transport(#[from] knode_transport::TransportError),

    /// A peer address could not be parsed as `host:port`.
    #[error("invalid contact address: {0}")]
    InvalidAddress(String),

    /// A CONTACTS or other structured payload failed to decode.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The remote peer answered with an unexpected RPC code.
    #[error("unexpected response code from peer")]
    UnexpectedResponse,
}

/// Convenience result type for DHT operations.
pub type Result<T> = std::result::Result<T, DhtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(K, 20);
        assert_eq!(ALPHA, 3);
        assert_eq!(NUM_BUCKETS, 160);
        assert_eq!(PING_TIMEOUT_SECS, 5);
        assert_eq!(EPHEMERAL_POOL_SIZE, 100);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(DhtError::NoCloserNode.to_string(), "no closer node found");
        assert_eq!(
            DhtError::NoContactsKnown.to_string(),
            "no closest node found"
        );
    }
}
