//! Bootstrap: add the configured bootstrap contact to the routing table,
//! then perform a self-lookup so the dispatcher's touch-on-receive populates
//! the table with whatever peers the lookup discovers along the way.

use knode_types::{Contact, NodeId};
use tracing::info;

use crate::node::Node;

/// Join the network via `bootstrap_contact`.
pub async fn join(node: &Node, bootstrap_contact: Contact) {
    {
        let mut routing = node
            .state
            .routing
            .lock()
            .expect("routing table mutex poisoned");
        routing.add(bootstrap_contact);
    }

    let self_id: NodeId = node.state.me.id;
    let discovered = node.node_lookup(self_id).await;
    info!(
        peers_discovered = discovered.len(),
        "bootstrap self-lookup complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeState;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn join_adds_the_bootstrap_contact() {
        let state = NodeState::bind(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            "127.0.0.1",
            NodeId::random(),
        )
        .await
        .expect("bind");
        let node = Node::new(state);

        let bootstrap = Contact::new(NodeId::random(), "127.0.0.1:1");
        join(&node, bootstrap.clone()).await;

        let routing = node.state.routing.lock().expect("lock");
        let closest = routing.closest(&bootstrap.id, 1);
        assert_eq!(closest.first().map(|c| c.id), Some(bootstrap.id));
    }
}
