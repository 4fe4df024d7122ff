//! Peer records exchanged between nodes and stored in the routing table.

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A peer the local node knows about.
///
/// `distance` is a cache set by whichever operation is currently ranking
/// contacts (e.g. a `closest()` query); it is not part of equality, since two
/// records with the same id always name the same peer regardless of which
/// target they were last measured against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    /// The peer's node id.
    pub id: NodeId,
    /// The peer's transport endpoint, rendered as `"host:port"`.
    pub address: String,
    /// XOR distance to whatever target the current operation cares about.
    #[serde(skip)]
    pub distance: Option<NodeId>,
}

impl Contact {
    /// Build a contact with no cached distance.
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            distance: None,
        }
    }

    /// Return a copy of this contact with `distance` set to the XOR distance
    /// between its id and `target`.
    pub fn with_distance_to(&self, target: &NodeId) -> Self {
        Self {
            id: self.id,
            address: self.address.clone(),
            distance: Some(self.id.xor(target)),
        }
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_address_and_distance() {
        let id = NodeId::random();
        let a = Contact::new(id, "127.0.0.1:9000");
        let mut b = Contact::new(id, "127.0.0.1:9999");
        b.distance = Some(NodeId::random());
        assert_eq!(a, b);
    }

    #[test]
    fn distance_cache_does_not_affect_equality() {
        let target = NodeId::random();
        let c = Contact::new(NodeId::random(), "127.0.0.1:9000");
        let with_distance = c.with_distance_to(&target);
        assert_eq!(c, with_distance);
        assert_eq!(with_distance.distance, Some(with_distance.id.xor(&target)));
    }
}
