//! The high-level, process-lifetime node: shared state plus the operations
//! the command channel drives (`put`, `get`, `ping`, `print_id`).

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use knode_transport::envelope::RpcCode;
use knode_transport::port_pool::PortPool;
use knode_transport::socket::Transport;
use knode_types::{Contact, NodeId};

use crate::routing::RoutingTable;
use crate::store::{value_id_of, PutOutcome, Store};
use crate::{rpc, DhtError, Result, ALPHA, EPHEMERAL_POOL_SIZE};

/// State shared between the dispatcher's handler tasks and the node's own
/// client operations.
pub struct NodeState {
    /// This node's own contact record (id + advertised `"host:port"`).
    pub me: Contact,
    /// The routing table. Locked only for the add/closest critical section,
    /// never across an `.await`.
    pub routing: Mutex<RoutingTable>,
    /// The value store. Same locking discipline as `routing`.
    pub store: Mutex<Store>,
    /// The datagram transport.
    pub transport: Arc<Transport>,
}

impl NodeState {
    /// Bind a fresh node listening on `bind_ip:main_port`, advertising
    /// `advertised_address` to peers, with the default-sized ephemeral port
    /// pool starting just above `main_port`.
    pub async fn bind(
        bind_ip: IpAddr,
        main_port: u16,
        advertised_host: impl Into<String>,
        id: NodeId,
    ) -> Result<Arc<Self>> {
        Self::bind_with_pool(
            bind_ip,
            main_port,
            advertised_host,
            id,
            main_port.wrapping_add(1),
            EPHEMERAL_POOL_SIZE,
        )
        .await
    }

    /// Like [`NodeState::bind`], but with an explicit ephemeral port range.
    /// `advertised_host` is combined with the bound main port (which may
    /// differ from `main_port` if it was `0`) to form this node's public
    /// contact address.
    pub async fn bind_with_pool(
        bind_ip: IpAddr,
        main_port: u16,
        advertised_host: impl Into<String>,
        id: NodeId,
        ephemeral_base: u16,
        ephemeral_pool_size: u16,
    ) -> Result<Arc<Self>> {
        let pool = Arc::new(PortPool::new(ephemeral_base, ephemeral_pool_size));
        let transport = Arc::new(Transport::bind(bind_ip, main_port, pool).await?);
        let me = Contact::new(
            id,
            format!("{}:{}", advertised_host.into(), transport.main_port()),
        );
        Ok(Arc::new(Self {
            routing: Mutex::new(RoutingTable::new(me.id)),
            store: Mutex::new(Store::new()),
            me,
            transport,
        }))
    }

    fn lock_routing(&self) -> std::sync::MutexGuard<'_, RoutingTable> {
        self.routing.lock().expect("routing table mutex poisoned")
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().expect("store mutex poisoned")
    }
}

/// The node-level operations the command channel invokes.
pub struct Node {
    pub state: Arc<NodeState>,
}

impl Node {
    /// Wrap already-built shared state.
    pub fn new(state: Arc<NodeState>) -> Self {
        Self { state }
    }

    /// This node's own id, rendered as 40 lowercase hex characters.
    pub fn print_id(&self) -> String {
        self.state.me.id.to_hex()
    }

    /// `ping <node_id>`: ping self immediately with no network I/O; ping a
    /// remote id by forwarding toward the known contact closest to it.
    pub async fn send_ping(&self, target_id: NodeId) -> Result<String> {
        let me_id = self.state.me.id;
        if target_id == me_id {
            return Ok(format!("Ping response from {}", me_id.to_hex()));
        }

        let closest = {
            let routing = self.state.lock_routing();
            routing.closest(&target_id, 1)
        };
        let Some(contact) = closest.into_iter().next() else {
            return Ok("Ping fail; no closest node found".to_string());
        };
        if !(contact.id.xor(&target_id) < me_id.xor(&target_id)) {
            return Ok("Ping fail; no closer node found".to_string());
        }

        let addr = rpc::parse_address(&contact.address)?;
        let reply = rpc::ping(&self.state.transport, &self.state.me, addr, target_id).await?;
        match reply.rpc {
            RpcCode::PingOk => Ok(format!("Ping response from {}", target_id.to_hex())),
            RpcCode::PingFail => {
                let reason = reply
                    .data
                    .first()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                Ok(format!("Ping fail; {reason}"))
            }
            _ => Err(DhtError::UnexpectedResponse),
        }
    }

    /// `put <key> <value>`: store `value` under the id `SHA-1(key)`, locally
    /// if this node is the closest known contact, otherwise forwarded.
    pub async fn send_store(&self, key: &str, value: Vec<u8>) -> Result<String> {
        let value_id = value_id_of(key.as_bytes());
        let me_id = self.state.me.id;

        let closest = {
            let routing = self.state.lock_routing();
            routing.closest(&value_id, 1)
        };
        let forward_to = closest
            .into_iter()
            .next()
            .filter(|c| c.id.xor(&value_id) < me_id.xor(&value_id));

        let Some(contact) = forward_to else {
            let outcome = self.state.lock_store().put(value_id, value);
            return Ok(match outcome {
                PutOutcome::Stored => "Value has been stored in the network".to_string(),
                PutOutcome::Exists => "Value already exists".to_string(),
            });
        };

        let addr = rpc::parse_address(&contact.address)?;
        let reply = rpc::store(&self.state.transport, &self.state.me, addr, value_id, value).await?;
        match reply.rpc {
            RpcCode::StoreOk => Ok("Value has been stored in the network".to_string()),
            RpcCode::StoreExists => Ok("Value already exists".to_string()),
            _ => Err(DhtError::UnexpectedResponse),
        }
    }

    /// `get <key>`: return the value stored locally under `SHA-1(key)`, or
    /// forward a single `FIND_VALUE` hop toward the closest known contact.
    pub async fn send_find_value(&self, key: &str) -> Result<Vec<u8>> {
        let value_id = value_id_of(key.as_bytes());

        if let Some(value) = self.state.lock_store().get(&value_id) {
            return Ok(value.to_vec());
        }

        let closest = {
            let routing = self.state.lock_routing();
            routing.closest(&value_id, 1)
        };
        let Some(contact) = closest.into_iter().next() else {
            return Err(DhtError::ValueNotFound);
        };

        let addr = rpc::parse_address(&contact.address)?;
        let reply = rpc::find_value(&self.state.transport, &self.state.me, addr, value_id).await?;
        match reply.rpc {
            RpcCode::ValFound => Ok(reply.data.into_iter().next().unwrap_or_default()),
            RpcCode::Contacts => Err(DhtError::ValueNotFound),
            _ => Err(DhtError::UnexpectedResponse),
        }
    }

    /// Run the iterative node-lookup for `target`, returning the closest
    /// contacts found. Used both directly (e.g. a future `lookup` command)
    /// and by [`crate::join::join`].
    pub async fn node_lookup(&self, target: NodeId) -> Vec<Contact> {
        let seeds = {
            let routing = self.state.lock_routing();
            routing.closest(&target, ALPHA)
        };
        crate::lookup::node_lookup(&self.state.transport, &self.state.me, seeds, target).await
    }
}

/// Lower bound check used by tests to make sure the pool size constant
/// stays wired up to the node's bind path.
#[cfg(test)]
const _: () = assert!(EPHEMERAL_POOL_SIZE > 0);
