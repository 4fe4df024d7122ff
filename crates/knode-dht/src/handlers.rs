//! Server-side logic for PING, STORE, FIND_NODE, FIND_VALUE and
//! NODE_LOOKUP. Each handler receives the inbound auth token, the address to
//! reply to, and the decoded parameters, and returns the [`Envelope`] the
//! dispatcher should send back.

use std::net::SocketAddr;
use std::sync::Arc;

use knode_transport::auth::AuthToken;
use knode_transport::envelope::{Envelope, RpcCode};
use knode_types::NodeId;
use tracing::warn;

use crate::node::NodeState;
use crate::store::PutOutcome;
use crate::{rpc, ALPHA};

fn reply(state: &NodeState, aid: AuthToken, rpc: RpcCode, data: Vec<Vec<u8>>) -> Envelope {
    Envelope {
        rpc,
        src_node_id: state.me.id,
        src_port: state.transport.main_port(),
        aid,
        data,
    }
}

/// Handle an inbound `PING` request.
pub async fn handle_ping(state: &Arc<NodeState>, aid: AuthToken, target_id: NodeId) -> Envelope {
    let me_id = state.me.id;
    if target_id == me_id {
        return reply(state, aid, RpcCode::PingOk, Vec::new());
    }

    let closest = {
        let routing = state.routing.lock().expect("routing table mutex poisoned");
        routing.closest(&target_id, 1)
    };
    let Some(contact) = closest.into_iter().next() else {
        return reply(
            state,
            aid,
            RpcCode::PingFail,
            vec![b"no closest node found".to_vec()],
        );
    };
    if !(contact.id.xor(&target_id) < me_id.xor(&target_id)) {
        return reply(
            state,
            aid,
            RpcCode::PingFail,
            vec![b"no closer node found".to_vec()],
        );
    }

    let addr = match rpc::parse_address(&contact.address) {
        Ok(addr) => addr,
        Err(e) => {
            warn!(error = %e, "closest contact has an unparseable address");
            return reply(
                state,
                aid,
                RpcCode::PingFail,
                vec![b"no closer node found".to_vec()],
            );
        }
    };

    match rpc::ping(&state.transport, &state.me, addr, target_id).await {
        Ok(forwarded) => Envelope {
            rpc: forwarded.rpc,
            src_node_id: state.me.id,
            src_port: state.transport.main_port(),
            aid,
            data: forwarded.data,
        },
        Err(e) => {
            warn!(error = %e, "ping forward failed");
            reply(
                state,
                aid,
                RpcCode::PingFail,
                vec![b"no closer node found".to_vec()],
            )
        }
    }
}

/// Handle an inbound `STORE` request.
pub async fn handle_store(
    state: &Arc<NodeState>,
    aid: AuthToken,
    value_id: NodeId,
    value: Vec<u8>,
) -> Envelope {
    let me_id = state.me.id;
    let closest = {
        let routing = state.routing.lock().expect("routing table mutex poisoned");
        routing.closest(&value_id, 1)
    };
    let forward_to = closest
        .into_iter()
        .next()
        .filter(|c| c.id.xor(&value_id) < me_id.xor(&value_id));

    let Some(contact) = forward_to else {
        let outcome = state
            .store
            .lock()
            .expect("store mutex poisoned")
            .put(value_id, value);
        return match outcome {
            PutOutcome::Stored => reply(state, aid, RpcCode::StoreOk, Vec::new()),
            PutOutcome::Exists => reply(state, aid, RpcCode::StoreExists, Vec::new()),
        };
    };

    let addr = match rpc::parse_address(&contact.address) {
        Ok(addr) => addr,
        Err(e) => {
            warn!(error = %e, "closest contact has an unparseable address");
            let outcome = state
                .store
                .lock()
                .expect("store mutex poisoned")
                .put(value_id, value);
            return match outcome {
                PutOutcome::Stored => reply(state, aid, RpcCode::StoreOk, Vec::new()),
                PutOutcome::Exists => reply(state, aid, RpcCode::StoreExists, Vec::new()),
            };
        }
    };

    let fallback_value = value.clone();
    match rpc::store(&state.transport, &state.me, addr, value_id, value).await {
        Ok(forwarded) => Envelope {
            rpc: forwarded.rpc,
            src_node_id: state.me.id,
            src_port: state.transport.main_port(),
            aid,
            data: forwarded.data,
        },
        Err(e) => {
            warn!(error = %e, "store forward failed, storing locally instead");
            let outcome = state
                .store
                .lock()
                .expect("store mutex poisoned")
                .put(value_id, fallback_value);
            match outcome {
                PutOutcome::Stored => reply(state, aid, RpcCode::StoreOk, Vec::new()),
                PutOutcome::Exists => reply(state, aid, RpcCode::StoreExists, Vec::new()),
            }
        }
    }
}

/// Handle an inbound `FIND_NODE` request.
pub async fn handle_find_node(
    state: &Arc<NodeState>,
    aid: AuthToken,
    target_id: NodeId,
) -> Envelope {
    let contacts = {
        let routing = state.routing.lock().expect("routing table mutex poisoned");
        routing.closest(&target_id, crate::K)
    };
    match rpc::encode_contacts(&contacts) {
        Ok(encoded) => reply(state, aid, RpcCode::Contacts, vec![encoded]),
        Err(e) => {
            warn!(error = %e, "failed to encode contact list");
            reply(state, aid, RpcCode::Contacts, vec![Vec::new()])
        }
    }
}

/// Handle an inbound `FIND_VALUE` request.
pub async fn handle_find_value(
    state: &Arc<NodeState>,
    aid: AuthToken,
    value_id: NodeId,
) -> Envelope {
    let local = state
        .store
        .lock()
        .expect("store mutex poisoned")
        .get(&value_id)
        .map(<[u8]>::to_vec);

    if let Some(value) = local {
        return reply(state, aid, RpcCode::ValFound, vec![value]);
    }

    let contacts = {
        let routing = state.routing.lock().expect("routing table mutex poisoned");
        routing.closest(&value_id, crate::K)
    };
    match rpc::encode_contacts(&contacts) {
        Ok(encoded) => reply(state, aid, RpcCode::Contacts, vec![encoded]),
        Err(e) => {
            warn!(error = %e, "failed to encode contact list");
            reply(state, aid, RpcCode::Contacts, vec![Vec::new()])
        }
    }
}

/// Handle an inbound `NODE_LOOKUP` request by running the full iterative
/// procedure and replying with its result.
pub async fn handle_node_lookup(
    state: &Arc<NodeState>,
    aid: AuthToken,
    target_id: NodeId,
) -> Envelope {
    let seeds = {
        let routing = state.routing.lock().expect("routing table mutex poisoned");
        routing.closest(&target_id, ALPHA)
    };
    let result = crate::lookup::node_lookup(&state.transport, &state.me, seeds, target_id).await;
    match rpc::encode_contacts(&result) {
        Ok(encoded) => reply(state, aid, RpcCode::Contacts, vec![encoded]),
        Err(e) => {
            warn!(error = %e, "failed to encode contact list");
            reply(state, aid, RpcCode::Contacts, vec![Vec::new()])
        }
    }
}

/// Reply to whoever sent the envelope `from`, using the transport's
/// unreliable one-shot reply path.
pub async fn send_reply_to(state: &Arc<NodeState>, from: SocketAddr, envelope: &Envelope) {
    if let Err(e) = state.transport.send_reply(from, envelope).await {
        warn!(%from, error = %e, "failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knode_transport::port_pool::PortPool;
    use knode_transport::socket::Transport;
    use knode_types::Contact;
    use std::net::Ipv4Addr;

    async fn make_state() -> Arc<NodeState> {
        let pool = Arc::new(PortPool::new(0, 4));
        let transport = Arc::new(
            Transport::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, pool)
                .await
                .expect("bind"),
        );
        let me = Contact::new(NodeId::random(), "127.0.0.1:0");
        Arc::new(NodeState {
            routing: std::sync::Mutex::new(crate::routing::RoutingTable::new(me.id)),
            store: std::sync::Mutex::new(crate::store::Store::new()),
            me,
            transport,
        })
    }

    use std::net::IpAddr;

    #[tokio::test]
    async fn ping_to_self_replies_ok_with_no_network() {
        let state = make_state().await;
        let aid = AuthToken::generate();
        let reply = handle_ping(&state, aid, state.me.id).await;
        assert_eq!(reply.rpc, RpcCode::PingOk);
        assert!(reply.data.is_empty());
        assert_eq!(reply.aid, aid);
    }

    #[tokio::test]
    async fn ping_with_no_known_contacts_fails() {
        let state = make_state().await;
        let aid = AuthToken::generate();
        let reply = handle_ping(&state, aid, NodeId::random()).await;
        assert_eq!(reply.rpc, RpcCode::PingFail);
    }

    #[tokio::test]
    async fn store_locally_when_no_closer_contact_known() {
        let state = make_state().await;
        let aid = AuthToken::generate();
        let value_id = crate::store::value_id_of(b"key");
        let reply = handle_store(&state, aid, value_id, b"value".to_vec()).await;
        assert_eq!(reply.rpc, RpcCode::StoreOk);

        let reply2 = handle_store(&state, aid, value_id, b"value2".to_vec()).await;
        assert_eq!(reply2.rpc, RpcCode::StoreExists);
    }

    #[tokio::test]
    async fn find_node_returns_contacts_reply() {
        let state = make_state().await;
        let aid = AuthToken::generate();
        let reply = handle_find_node(&state, aid, NodeId::random()).await;
        assert_eq!(reply.rpc, RpcCode::Contacts);
        let contacts = rpc::decode_contacts(&reply.data[0]).expect("decode");
        assert!(contacts.is_empty());
    }

    #[tokio::test]
    async fn find_value_present_locally_returns_val_found() {
        let state = make_state().await;
        let value_id = crate::store::value_id_of(b"key");
        state
            .store
            .lock()
            .expect("lock")
            .put(value_id, b"value".to_vec());

        let aid = AuthToken::generate();
        let reply = handle_find_value(&state, aid, value_id).await;
        assert_eq!(reply.rpc, RpcCode::ValFound);
        assert_eq!(reply.data[0], b"value");
    }

    #[tokio::test]
    async fn find_value_absent_returns_contacts() {
        let state = make_state().await;
        let aid = AuthToken::generate();
        let reply = handle_find_value(&state, aid, NodeId::random()).await;
        assert_eq!(reply.rpc, RpcCode::Contacts);
    }
}
