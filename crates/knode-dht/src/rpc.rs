//! Helpers for issuing outbound RPCs and encoding their payloads.
//!
//! Shared by [`crate::lookup`] (which issues `FIND_NODE`) and
//! [`crate::handlers`] (which forwards `PING` and `STORE`).

use std::net::SocketAddr;

use knode_transport::auth::AuthToken;
use knode_transport::envelope::{Envelope, RpcCode};
use knode_transport::socket::Transport;
use knode_types::{Contact, NodeId};

use crate::{DhtError, Result};

/// Parse a `"host:port"` contact address into a [`SocketAddr`].
pub fn parse_address(address: &str) -> Result<SocketAddr> {
    address
        .parse()
        .map_err(|_| DhtError::InvalidAddress(address.to_string()))
}

/// Serialize a contact list for a `CONTACTS` reply payload.
pub fn encode_contacts(contacts: &[Contact]) -> Result<Vec<u8>> {
    serde_json::to_vec(contacts).map_err(|e| DhtError::MalformedPayload(e.to_string()))
}

/// Parse a `CONTACTS` payload back into a contact list.
pub fn decode_contacts(bytes: &[u8]) -> Result<Vec<Contact>> {
    serde_json::from_slice(bytes).map_err(|e| DhtError::MalformedPayload(e.to_string()))
}

fn request_envelope(me: &Contact, rpc: RpcCode, data: Vec<Vec<u8>>, main_port: u16) -> Envelope {
    Envelope {
        rpc,
        src_node_id: me.id,
        src_port: main_port,
        aid: AuthToken::generate(),
        data,
    }
}

/// Issue `FIND_NODE` to `dest` and return the contacts it replies with.
pub async fn find_node(
    transport: &Transport,
    me: &Contact,
    dest: SocketAddr,
    target: NodeId,
) -> Result<Vec<Contact>> {
    let request = request_envelope(
        me,
        RpcCode::FindNode,
        vec![target.as_bytes().to_vec()],
        transport.main_port(),
    );
    let (reply, _from) = transport.send_and_wait(dest, &request).await?;
    match reply.rpc {
        RpcCode::Contacts => decode_contacts(&reply.data.first().cloned().unwrap_or_default()),
        _ => Err(DhtError::UnexpectedResponse),
    }
}

/// Issue `PING` to `dest` on behalf of a forwarding handler, returning the
/// raw reply envelope so the caller can relay its rpc code verbatim.
pub async fn ping(
    transport: &Transport,
    me: &Contact,
    dest: SocketAddr,
    target_id: NodeId,
) -> Result<Envelope> {
    let request = request_envelope(
        me,
        RpcCode::Ping,
        vec![target_id.as_bytes().to_vec()],
        transport.main_port(),
    );
    let (reply, _from) = transport.send_and_wait(dest, &request).await?;
    Ok(reply)
}

/// Issue `STORE` to `dest` on behalf of a forwarding handler, returning the
/// raw reply envelope so the caller can relay its rpc code verbatim.
pub async fn store(
    transport: &Transport,
    me: &Contact,
    dest: SocketAddr,
    value_id: NodeId,
    value: Vec<u8>,
) -> Result<Envelope> {
    let request = request_envelope(
        me,
        RpcCode::Store,
        vec![value_id.as_bytes().to_vec(), value],
        transport.main_port(),
    );
    let (reply, _from) = transport.send_and_wait(dest, &request).await?;
    Ok(reply)
}

/// Issue `FIND_VALUE` to `dest` on behalf of a forwarding handler or the
/// `get` command, returning the raw reply envelope (either `VAL_FOUND` or
/// `CONTACTS`) so the caller can decide how to interpret it.
pub async fn find_value(
    transport: &Transport,
    me: &Contact,
    dest: SocketAddr,
    value_id: NodeId,
) -> Result<Envelope> {
    let request = request_envelope(
        me,
        RpcCode::FindValue,
        vec![value_id.as_bytes().to_vec()],
        transport.main_port(),
    );
    let (reply, _from) = transport.send_and_wait(dest, &request).await?;
    Ok(reply)
}

/// Issue `NODE_LOOKUP` to `dest`, returning the contacts it replies with.
pub async fn node_lookup(
    transport: &Transport,
    me: &Contact,
    dest: SocketAddr,
    target: NodeId,
) -> Result<Vec<Contact>> {
    let request = request_envelope(
        me,
        RpcCode::NodeLookup,
        vec![target.as_bytes().to_vec()],
        transport.main_port(),
    );
    let (reply, _from) = transport.send_and_wait(dest, &request).await?;
    match reply.rpc {
        RpcCode::Contacts => decode_contacts(&reply.data.first().cloned().unwrap_or_default()),
        _ => Err(DhtError::UnexpectedResponse),
    }
}
