//! The in-memory value store.
//!
//! At most one entry per key; re-storing an existing key is a no-op
//! reported as [`PutOutcome::Exists`]. No eviction, no TTL, no persistence
//! across process restarts.

use std::collections::HashMap;

use knode_types::NodeId;
use sha1::{Digest, Sha1};

/// Derive a value id (treated as a [`NodeId`]) as the SHA-1 digest of `bytes`.
pub fn value_id_of(bytes: &[u8]) -> NodeId {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let bytes: [u8; 20] = digest.as_slice().try_into().expect("SHA-1 digest is 20 bytes");
    NodeId::from_bytes(bytes)
}

/// Outcome of a [`Store::put`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// The value was not previously present and has been stored.
    Stored,
    /// A value already existed under this key; the store was left unchanged.
    Exists,
}

/// A process-lifetime key/value map keyed by value id.
#[derive(Default)]
pub struct Store {
    values: HashMap<NodeId, Vec<u8>>,
}

impl Store {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, unless it is already present.
    pub fn put(&mut self, key: NodeId, value: Vec<u8>) -> PutOutcome {
        if self.values.contains_key(&key) {
            return PutOutcome::Exists;
        }
        self.values.insert(key, value);
        PutOutcome::Stored
    }

    /// Fetch the value stored under `key`, if any.
    pub fn get(&self, key: &NodeId) -> Option<&[u8]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Whether `key` is present.
    pub fn exists(&self, key: &NodeId) -> bool {
        self.values.contains_key(key)
    }
}
