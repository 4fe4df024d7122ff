//! The single long-running receiver on the main port: demultiplexes inbound
//! envelopes to the matching [`crate::handlers`] function in a fresh task,
//! after touching the routing table with the sender's contact.

use std::sync::Arc;

use knode_transport::envelope::{Envelope, RpcCode};
use knode_types::Contact;
use tracing::{debug, warn};

use crate::handlers;
use crate::node::NodeState;

/// Run the receive loop forever. Never returns except on a fatal transport
/// error (e.g. the socket itself closing).
pub async fn run(state: Arc<NodeState>) {
    loop {
        let (envelope, from) = match state.transport.recv_main().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "main socket receive failed, dispatcher stopping");
                return;
            }
        };

        let sender = Contact::new(
            envelope.src_node_id,
            format!("{}:{}", from.ip(), envelope.src_port),
        );
        {
            let mut routing = state.routing.lock().expect("routing table mutex poisoned");
            routing.touch(sender);
        }

        if envelope.rpc.is_response() {
            debug!(rpc = ?envelope.rpc, %from, "dropping response-coded datagram on main port");
            continue;
        }

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            dispatch(&state, envelope, from).await;
        });
    }
}

async fn dispatch(state: &Arc<NodeState>, envelope: Envelope, from: std::net::SocketAddr) {
    let aid = envelope.aid;
    let reply = match envelope.rpc {
        RpcCode::Ping => match decode_single_id(&envelope.data) {
            Some(target_id) => handlers::handle_ping(state, aid, target_id).await,
            None => return malformed(state, from, aid).await,
        },
        RpcCode::Store => match decode_store_params(&envelope.data) {
            Some((value_id, value)) => handlers::handle_store(state, aid, value_id, value).await,
            None => return malformed(state, from, aid).await,
        },
        RpcCode::FindNode => match decode_single_id(&envelope.data) {
            Some(target_id) => handlers::handle_find_node(state, aid, target_id).await,
            None => return malformed(state, from, aid).await,
        },
        RpcCode::FindValue => match decode_single_id(&envelope.data) {
            Some(value_id) => handlers::handle_find_value(state, aid, value_id).await,
            None => return malformed(state, from, aid).await,
        },
        RpcCode::NodeLookup => match decode_single_id(&envelope.data) {
            Some(target_id) => handlers::handle_node_lookup(state, aid, target_id).await,
            None => return malformed(state, from, aid).await,
        },
        _ => return,
    };

    handlers::send_reply_to(state, from, &reply).await;
}

async fn malformed(state: &Arc<NodeState>, from: std::net::SocketAddr, _aid: knode_transport::auth::AuthToken) {
    warn!(%from, "dropping request with malformed payload");
    let _ = state;
}

fn decode_single_id(data: &[Vec<u8>]) -> Option<knode_types::NodeId> {
    let bytes: [u8; knode_types::ID_LEN] = data.first()?.as_slice().try_into().ok()?;
    Some(knode_types::NodeId::from_bytes(bytes))
}

fn decode_store_params(data: &[Vec<u8>]) -> Option<(knode_types::NodeId, Vec<u8>)> {
    let id_bytes: [u8; knode_types::ID_LEN] = data.first()?.as_slice().try_into().ok()?;
    let value = data.get(1)?.clone();
    Some((knode_types::NodeId::from_bytes(id_bytes), value))
}
