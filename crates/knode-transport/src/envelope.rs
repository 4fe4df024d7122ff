//! The wire envelope every datagram carries, and the RPC code space.

use serde::{Deserialize, Serialize};

use knode_types::NodeId;

use crate::auth::AuthToken;
use crate::{Result, TransportError};

/// Maximum size, in bytes, of an encoded datagram.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// RPC codes. Requests occupy `0x01..=0x0F`; responses occupy `0xF0..=0xFF`
/// (high nibble `0xF` marks a response).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RpcCode {
    /// Is the target node reachable / does it answer?
    Ping = 0x01,
    /// Store a value under a value-id.
    Store = 0x02,
    /// Ask for the k closest known contacts to a target id.
    FindNode = 0x03,
    /// Ask for a value, or the k closest contacts if not held locally.
    FindValue = 0x04,
    /// Ask the receiver to run a full iterative lookup on our behalf.
    NodeLookup = 0x05,

    /// Successful ping reply.
    PingOk = 0xF0,
    /// Ping forwarding failed (no closer/known node).
    PingFail = 0xF1,
    /// Value was newly stored.
    StoreOk = 0xF2,
    /// Value was already present.
    StoreExists = 0xF3,
    /// A list of contacts.
    Contacts = 0xF4,
    /// A found value.
    ValFound = 0xF5,
}

impl RpcCode {
    /// True for the `0xF0..=0xFF` response codes.
    pub fn is_response(self) -> bool {
        (self as u8) & 0xF0 == 0xF0
    }

    /// True for the `0x01..=0x0F` request codes.
    pub fn is_request(self) -> bool {
        !self.is_response()
    }
}

impl TryFrom<u8> for RpcCode {
    type Error = TransportError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            0x01 => RpcCode::Ping,
            0x02 => RpcCode::Store,
            0x03 => RpcCode::FindNode,
            0x04 => RpcCode::FindValue,
            0x05 => RpcCode::NodeLookup,
            0xF0 => RpcCode::PingOk,
            0xF1 => RpcCode::PingFail,
            0xF2 => RpcCode::StoreOk,
            0xF3 => RpcCode::StoreExists,
            0xF4 => RpcCode::Contacts,
            0xF5 => RpcCode::ValFound,
            other => {
                return Err(TransportError::Deserialization(format!(
                    "unknown rpc code 0x{other:02X}"
                )))
            }
        })
    }
}

impl From<RpcCode> for u8 {
    fn from(code: RpcCode) -> Self {
        code as u8
    }
}

/// A decoded (or about-to-be-encoded) datagram.
///
/// `src_port` carries the sender's *main* listening port, not the ephemeral
/// source port the datagram was actually sent from — the receiver must use
/// `src_port` (together with the UDP source address's host) to reconstruct a
/// contact it can route future requests to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub rpc: RpcCode,
    pub src_node_id: NodeId,
    pub src_port: u16,
    pub aid: AuthToken,
    pub data: Vec<Vec<u8>>,
}

impl Envelope {
    /// Serialize to the wire format, rejecting anything over
    /// [`MAX_DATAGRAM_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::OversizedDatagram {
                size: bytes.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Parse from the wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| TransportError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            rpc: RpcCode::Ping,
            src_node_id: NodeId::random(),
            src_port: 9000,
            aid: AuthToken::generate(),
            data: vec![b"hello".to_vec()],
        }
    }

    #[test]
    fn request_and_response_codes_are_partitioned() {
        assert!(RpcCode::Ping.is_request());
        assert!(RpcCode::Store.is_request());
        assert!(RpcCode::FindNode.is_request());
        assert!(RpcCode::FindValue.is_request());
        assert!(RpcCode::NodeLookup.is_request());

        assert!(RpcCode::PingOk.is_response());
        assert!(RpcCode::PingFail.is_response());
        assert!(RpcCode::StoreOk.is_response());
        assert!(RpcCode::StoreExists.is_response());
        assert!(RpcCode::Contacts.is_response());
        assert!(RpcCode::ValFound.is_response());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let env = sample();
        let bytes = env.encode().expect("encode");
        let decoded = Envelope::decode(&bytes).expect("decode");
        assert_eq!(decoded.rpc, env.rpc);
        assert_eq!(decoded.src_node_id, env.src_node_id);
        assert_eq!(decoded.src_port, env.src_port);
        assert_eq!(decoded.aid, env.aid);
        assert_eq!(decoded.data, env.data);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut env = sample();
        env.data = vec![vec![0u8; MAX_DATAGRAM_SIZE * 2]];
        assert!(matches!(
            env.encode(),
            Err(TransportError::OversizedDatagram { .. })
        ));
    }

    #[test]
    fn truncated_datagram_fails_to_decode() {
        let env = sample();
        let bytes = env.encode().expect("encode");
        let truncated = &bytes[..bytes.len() / 2];
        assert!(Envelope::decode(truncated).is_err());
    }

    #[test]
    fn unknown_rpc_code_is_rejected() {
        assert!(RpcCode::try_from(0x42).is_err());
    }
}
