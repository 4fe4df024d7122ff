//! Per-request authentication tokens.
//!
//! An [`AuthToken`] is attached to every outbound request and echoed
//! verbatim in the matching reply. Its only purpose is correlation: because
//! the ephemeral port an outbound request is sent from is reused across
//! requests, a datagram landing on that port some time later may be a late
//! reply to a *previous* request rather than the one currently awaited. The
//! token lets the waiter tell the two apart without relying on the OS socket
//! layer.

use serde::{Deserialize, Serialize};

/// Number of bytes in an [`AuthToken`] (160 bits, matching the node id space).
pub const TOKEN_LEN: usize = 20;

/// An opaque per-request nonce, fresh for every request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthToken(#[serde(with = "hex_bytes")] [u8; TOKEN_LEN]);

impl AuthToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Render as 40 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthToken({})", self.to_hex())
    }
}

mod hex_bytes {
    use super::TOKEN_LEN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; TOKEN_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; TOKEN_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decoded = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if decoded.len() != TOKEN_LEN {
            return Err(serde::de::Error::custom(format!(
                "expected {TOKEN_LEN} bytes, got {}",
                decoded.len()
            )));
        }
        let mut out = [0u8; TOKEN_LEN];
        out.copy_from_slice(&decoded);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_fresh() {
        let a = AuthToken::generate();
        let b = AuthToken::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_roundtrip() {
        let token = AuthToken::generate();
        let hex = token.to_hex();
        assert_eq!(hex.len(), 40);
        let decoded: AuthToken =
            serde_json::from_str(&serde_json::to_string(&token).expect("serialize"))
                .expect("deserialize");
        assert_eq!(decoded, token);
    }
}
