//! 160-bit identifier algebra and the XOR distance metric.
//!
//! Every peer and every stored value is named by a [`NodeId`]: a 20-byte
//! big-endian quantity. Peers derive distance to one another (and to value
//! keys) by XOR-ing two ids; the routing table places contacts into buckets
//! based on how many leading bits of that distance are zero.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of bytes in a [`NodeId`] (160 bits).
pub const ID_LEN: usize = 20;

/// A 160-bit identifier shared by peers and stored values.
///
/// Value identifiers are the SHA-1 digest of the value's raw bytes, treated
/// as a `NodeId` so they live in the same space as peer ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(#[serde(with = "hex_bytes")] [u8; ID_LEN]);

impl NodeId {
    /// Wrap a raw 20-byte id.
    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The all-zero id. Mostly useful as a placeholder in tests.
    pub const fn zero() -> Self {
        Self([0u8; ID_LEN])
    }

    /// Generate a random id using the thread-local RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Bitwise XOR of two ids, producing the XOR-distance between them.
    pub fn xor(&self, other: &NodeId) -> NodeId {
        let mut out = [0u8; ID_LEN];
        for i in 0..ID_LEN {
            out[i] = self.0[i] ^ other.0[i];
        }
        NodeId(out)
    }

    /// Unsigned big-endian strict less-than.
    pub fn less(&self, other: &NodeId) -> bool {
        self.0 < other.0
    }

    /// Index (0 = most significant bit) of the first set bit.
    ///
    /// Used to pick a routing-table bucket for a non-zero XOR distance.
    /// Returns `None` for the zero distance, which only occurs when
    /// comparing an id to itself; callers must filter self out before
    /// calling this.
    pub fn prefix_len(&self) -> Option<usize> {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return Some(i * 8 + byte.leading_zeros() as usize);
            }
        }
        None
    }

    /// Render as 40 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a strict 40-character hex string (case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        if s.len() != ID_LEN * 2 {
            return Err(IdError::WrongLength(s.len()));
        }
        let bytes = hex::decode(s).map_err(|_| IdError::InvalidHex)?;
        let mut out = [0u8; ID_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// Errors produced while parsing or validating a [`NodeId`].
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The input was not exactly 40 hex characters.
    #[error("node id must be {} hex characters, got {0}", ID_LEN * 2)]
    WrongLength(usize),
    /// The input contained non-hex characters.
    #[error("node id is not valid hex")]
    InvalidHex,
}

/// Serde support for rendering `[u8; ID_LEN]` as a hex string.
mod hex_bytes {
    use super::ID_LEN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; ID_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; ID_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decoded = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if decoded.len() != ID_LEN {
            return Err(serde::de::Error::custom(format!(
                "expected {ID_LEN} bytes, got {}",
                decoded.len()
            )));
        }
        let mut out = [0u8; ID_LEN];
        out.copy_from_slice(&decoded);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_is_symmetric_and_self_inverse() {
        let a = NodeId::random();
        let b = NodeId::random();
        assert_eq!(a.xor(&b), b.xor(&a));
        assert_eq!(a.xor(&a), NodeId::zero());
        assert_eq!(a.xor(&a.xor(&b)), b);
    }

    #[test]
    fn prefix_len_of_zero_distance_is_none() {
        let a = NodeId::random();
        assert_eq!(a.xor(&a).prefix_len(), None);
    }

    #[test]
    fn prefix_len_counts_leading_zero_bits() {
        let mut bytes = [0u8; ID_LEN];
        bytes[0] = 0x80;
        assert_eq!(NodeId(bytes).prefix_len(), Some(0));

        let mut bytes = [0u8; ID_LEN];
        bytes[0] = 0x01;
        assert_eq!(NodeId(bytes).prefix_len(), Some(7));

        let mut bytes = [0u8; ID_LEN];
        bytes[1] = 0x01;
        assert_eq!(NodeId(bytes).prefix_len(), Some(15));

        let mut bytes = [0u8; ID_LEN];
        bytes[ID_LEN - 1] = 0x01;
        assert_eq!(NodeId(bytes).prefix_len(), Some(ID_LEN * 8 - 1));
    }

    #[test]
    fn hex_roundtrip() {
        let id = NodeId::random();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 40);
        assert_eq!(NodeId::from_hex(&hex).expect("parse"), id);
    }

    #[test]
    fn hex_parsing_is_strict() {
        assert!(NodeId::from_hex("too-short").is_err());
        assert!(NodeId::from_hex(&"zz".repeat(20)).is_err());
        assert!(NodeId::from_hex(&"ab".repeat(19)).is_err());
    }

    #[test]
    fn hex_parsing_is_case_insensitive() {
        let id = NodeId::from_hex("FFFFFFFF00000000000000000000000000000000");
        assert!(id.is_ok());
    }

    #[test]
    fn ordering_is_big_endian_unsigned() {
        let low = NodeId::from_bytes([0u8; ID_LEN]);
        let mut high_bytes = [0u8; ID_LEN];
        high_bytes[0] = 1;
        let high = NodeId::from_bytes(high_bytes);
        assert!(low.less(&high));
        assert!(low < high);
    }
}
