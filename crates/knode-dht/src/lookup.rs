//! The iterative α-parallel node-lookup procedure.
//!
//! As specified, the lookup stops after exactly two hop-levels (the initial
//! α fan-out plus one recursive round) rather than looping until no closer
//! contact is discovered; see the crate-level design notes for the
//! fully-convergent alternative this intentionally stops short of.

use std::collections::HashMap;
use std::sync::Arc;

use knode_transport::socket::Transport;
use knode_types::{Contact, NodeId};

use crate::rpc;
use crate::K;

/// Find the K closest live contacts to `target`, starting from `seeds`
/// (normally the local routing table's α closest contacts to `target`).
///
/// Never sends a request to `me`'s own id. Failed or unreachable contacts
/// are silently dropped from the result rather than failing the lookup.
pub async fn node_lookup(
    transport: &Arc<Transport>,
    me: &Contact,
    seeds: Vec<Contact>,
    target: NodeId,
) -> Vec<Contact> {
    let mut shortlist: Vec<Contact> = seeds.iter().cloned().filter(|c| c.id != me.id).collect();

    let mut hop1 = tokio::task::JoinSet::new();
    for seed in shortlist.iter().cloned() {
        let transport = Arc::clone(transport);
        let me = me.clone();
        hop1.spawn(async move { query_one(&transport, &me, &seed, target).await });
    }

    let mut hop1_results: Vec<Vec<Contact>> = Vec::new();
    while let Some(joined) = hop1.join_next().await {
        if let Ok(found) = joined {
            hop1_results.push(found);
        }
    }

    let mut hop2 = tokio::task::JoinSet::new();
    for returned in hop1_results.iter().cloned() {
        let transport = Arc::clone(transport);
        let me = me.clone();
        let target_self_id = me.id;
        hop2.spawn(async move {
            let mut aggregate = Vec::new();
            for candidate in returned {
                if candidate.id == target_self_id {
                    continue;
                }
                aggregate.extend(query_one(&transport, &me, &candidate, target).await);
            }
            aggregate
        });
    }

    for found in hop1_results {
        shortlist.extend(found);
    }
    while let Some(joined) = hop2.join_next().await {
        if let Ok(found) = joined {
            shortlist.extend(found);
        }
    }

    shortlist.retain(|c| c.id != me.id);

    let mut by_id: HashMap<NodeId, Contact> = HashMap::new();
    for contact in shortlist {
        by_id.entry(contact.id).or_insert(contact);
    }

    let mut merged: Vec<Contact> = by_id
        .into_values()
        .map(|c| c.with_distance_to(&target))
        .collect();
    merged.sort_by(|a, b| {
        a.distance
            .expect("with_distance_to always sets distance")
            .cmp(&b.distance.expect("with_distance_to always sets distance"))
            .then_with(|| a.id.cmp(&b.id))
    });
    merged.truncate(K);
    merged
}

async fn query_one(
    transport: &Arc<Transport>,
    me: &Contact,
    target_contact: &Contact,
    target: NodeId,
) -> Vec<Contact> {
    let Ok(addr) = rpc::parse_address(&target_contact.address) else {
        return Vec::new();
    };
    rpc::find_node(transport, me, addr, target)
        .await
        .unwrap_or_default()
}
