//! # knode-transport
//!
//! Datagram request/response transport for the knode Kademlia DHT.
//!
//! This crate provides:
//!
//! - [`envelope`]: the self-describing wire envelope every datagram carries,
//!   and the RPC code space (requests `0x01..=0x0F`, responses `0xF0..=0xFF`).
//! - [`auth`]: the per-request [`auth::AuthToken`] that lets a reply be
//!   matched to its request even when it arrives on a reused ephemeral port.
//! - [`port_pool`]: the pool of ephemeral source ports used for outbound
//!   requests.
//! - [`socket`]: [`socket::Transport`], which ties the above together into
//!   `send_and_wait` / `send_reply` / `send_oneway` / `recv_main`.
//!
//! ## Wire format
//!
//! Envelopes are encoded as self-describing JSON (one object per datagram),
//! matching the convention that byte-array payload fields need no bespoke
//! binary codec to round-trip through `serde`. Maximum datagram size is
//! [`envelope::MAX_DATAGRAM_SIZE`] bytes.

pub mod auth;
pub mod envelope;
pub mod port_pool;
pub mod socket;

/// Error types for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The envelope could not be serialized to the wire format.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The envelope could not be parsed from the wire format.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The encoded envelope exceeds the maximum datagram size.
    #[error("datagram too large: {size} bytes exceeds maximum of {max} bytes")]
    OversizedDatagram { size: usize, max: usize },

    /// No matching reply arrived within the request timeout.
    #[error("request timed out waiting for a reply")]
    Timeout,

    /// The ephemeral port pool has no free ports after all retries.
    #[error("ephemeral port pool exhausted")]
    PortsExhausted,

    /// A socket operation failed.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::OversizedDatagram {
            size: 2000,
            max: 1024,
        };
        assert!(err.to_string().contains("2000"));
        assert!(err.to_string().contains("1024"));
    }
}
