//! The k-bucket routing table.
//!
//! One bucket per bit of the node id space, indexed by the position of the
//! highest set bit in the XOR distance from `me`. Within a bucket, order
//! reflects recency of last observation: oldest at the front, newest at the
//! back.

use std::collections::VecDeque;

use knode_types::{Contact, NodeId};

use crate::K;

/// The result of attempting to add a contact to the routing table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddResult {
    /// The contact was newly inserted.
    Inserted,
    /// The contact was already present; its position was refreshed.
    Updated,
    /// The contact's id equals `me`'s; no effect.
    SelfIgnored,
    /// The target bucket already holds `K` entries. The new contact is
    /// dropped; the bucket's least-recently-seen entry is left in place.
    BucketFull,
}

/// A single k-bucket: at most [`K`] contacts, ordered least- to
/// most-recently-seen.
#[derive(Clone, Debug, Default)]
struct Bucket {
    entries: VecDeque<Contact>,
}

impl Bucket {
    fn position(&self, id: &NodeId) -> Option<usize> {
        self.entries.iter().position(|c| &c.id == id)
    }
}

/// The owner's view of the network: 160 k-buckets plus the owner's own
/// identity.
pub struct RoutingTable {
    me: NodeId,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// Build an empty routing table for the given local id.
    pub fn new(me: NodeId) -> Self {
        Self {
            me,
            buckets: (0..crate::NUM_BUCKETS).map(|_| Bucket::default()).collect(),
        }
    }

    /// The local node's id.
    pub fn me(&self) -> NodeId {
        self.me
    }

    fn bucket_index(&self, id: &NodeId) -> Option<usize> {
        self.me.xor(id).prefix_len()
    }

    /// Add (or refresh) a contact.
    ///
    /// A contact whose id equals `me` is ignored. An already-present contact
    /// moves to the tail of its bucket. A bucket at capacity drops the new
    /// contact rather than evicting anything — the routing table never
    /// probes the incumbent for liveness.
    pub fn add(&mut self, contact: Contact) -> AddResult {
        let Some(idx) = self.bucket_index(&contact.id) else {
            return AddResult::SelfIgnored;
        };

        let bucket = &mut self.buckets[idx];
        if let Some(pos) = bucket.position(&contact.id) {
            bucket.entries.remove(pos);
            bucket.entries.push_back(contact);
            return AddResult::Updated;
        }

        if bucket.entries.len() < K {
            bucket.entries.push_back(contact);
            return AddResult::Inserted;
        }

        AddResult::BucketFull
    }

    /// Semantic alias of [`RoutingTable::add`]. The dispatcher calls this on
    /// every inbound datagram using the sender's advertised id and address.
    pub fn touch(&mut self, contact: Contact) -> AddResult {
        self.add(contact)
    }

    /// Return up to `n` contacts closest to `target`, ascending by XOR
    /// distance, ties broken by id order. Never includes `me`.
    pub fn closest(&self, target: &NodeId, n: usize) -> Vec<Contact> {
        let mut all: Vec<Contact> = self
            .buckets
            .iter()
            .flat_map(|b| b.entries.iter())
            .cloned()
            .map(|c| c.with_distance_to(target))
            .collect();

        all.sort_by(|a, b| {
            a.distance
                .expect("with_distance_to always sets distance")
                .cmp(&b.distance.expect("with_distance_to always sets distance"))
                .then_with(|| a.id.cmp(&b.id))
        });
        all.truncate(n);
        all
    }

    /// Total number of contacts held across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    /// True if no contact is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact_with_prefix(me: &NodeId, leading_byte: u8, tail: u8) -> Contact {
        let mut bytes = *me.as_bytes();
        bytes[0] ^= leading_byte;
        bytes[bytes.len() - 1] ^= tail;
        Contact::new(NodeId::from_bytes(bytes), "127.0.0.1:9000")
    }

    #[test]
    fn adding_self_has_no_effect() {
        let me = NodeId::random();
        let mut table = RoutingTable::new(me);
        let result = table.add(Contact::new(me, "127.0.0.1:9000"));
        assert_eq!(result, AddResult::SelfIgnored);
        assert!(table.is_empty());
    }

    #[test]
    fn insert_then_update_moves_to_tail() {
        let me = NodeId::zero();
        let mut table = RoutingTable::new(me);
        let contact = contact_with_prefix(&me, 0x80, 0x01);

        assert_eq!(table.add(contact.clone()), AddResult::Inserted);
        assert_eq!(table.add(contact.clone()), AddResult::Updated);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn bucket_full_drops_new_contact() {
        let me = NodeId::zero();
        let mut table = RoutingTable::new(me);

        for i in 0..K as u8 {
            let contact = contact_with_prefix(&me, 0x80, i);
            assert_eq!(table.add(contact), AddResult::Inserted);
        }
        assert_eq!(table.len(), K);

        let first = table.closest(&me, K)[0].clone();
        let overflow = contact_with_prefix(&me, 0x80, K as u8);
        assert_eq!(table.add(overflow), AddResult::BucketFull);
        assert_eq!(table.len(), K);

        let still_first = table.closest(&me, K)[0].clone();
        assert_eq!(first.id, still_first.id);
    }

    #[test]
    fn closest_is_sorted_ascending_with_no_duplicates() {
        let me = NodeId::zero();
        let mut table = RoutingTable::new(me);
        for i in 1..=10u8 {
            table.add(contact_with_prefix(&me, 0x01, i));
        }

        let target = NodeId::zero();
        let closest = table.closest(&target, 5);
        assert_eq!(closest.len(), 5);

        for window in closest.windows(2) {
            let d0 = window[0].distance.unwrap();
            let d1 = window[1].distance.unwrap();
            assert!(d0 <= d1);
        }

        let mut ids: Vec<_> = closest.iter().map(|c| c.id).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn closest_never_includes_me() {
        let me = NodeId::zero();
        let mut table = RoutingTable::new(me);
        table.add(contact_with_prefix(&me, 0x01, 1));
        let closest = table.closest(&me, 100);
        assert!(closest.iter().all(|c| c.id != me));
    }
}
