//! The UDP transport: a well-known main socket for incoming requests, plus
//! an ephemeral port pool for outgoing request/response round trips.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::envelope::Envelope;
use crate::port_pool::PortPool;
use crate::{Result, TransportError};

/// How long `send_and_wait` waits for a matching reply before giving up.
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// How many times `send_and_wait` retries binding an ephemeral port before
/// surfacing [`TransportError::PortsExhausted`]. Binding can fail even for a
/// port the pool believes is free if the OS hasn't released it yet.
pub const MAX_BIND_RETRIES: usize = 10;

/// Releases a leased ephemeral port back to its pool when dropped, so a
/// request that errors, times out, or is cancelled never leaks a port.
struct PortLease {
    pool: Arc<PortPool>,
    port: u16,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.pool.release(self.port);
    }
}

/// The datagram transport for a single node.
pub struct Transport {
    main: UdpSocket,
    main_port: u16,
    bind_ip: IpAddr,
    pool: Arc<PortPool>,
}

impl Transport {
    /// Bind the main listening socket and set up the ephemeral port pool.
    pub async fn bind(bind_ip: IpAddr, main_port: u16, pool: Arc<PortPool>) -> Result<Self> {
        let main = UdpSocket::bind(SocketAddr::new(bind_ip, main_port))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self {
            main,
            main_port,
            bind_ip,
            pool,
        })
    }

    /// The port this node listens on for incoming requests.
    pub fn main_port(&self) -> u16 {
        self.main_port
    }

    /// Block until a datagram arrives on the main socket, returning the
    /// decoded envelope and the address it came from.
    pub async fn recv_main(&self) -> Result<(Envelope, SocketAddr)> {
        let mut buf = vec![0u8; crate::envelope::MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = self
                .main
                .recv_from(&mut buf)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            match Envelope::decode(&buf[..len]) {
                Ok(env) => return Ok((env, from)),
                Err(e) => {
                    warn!(%from, error = %e, "dropping malformed datagram");
                    continue;
                }
            }
        }
    }

    /// Send `reply` to `target` without waiting for anything back. Used both
    /// for genuine one-way replies and, with a fresh token, for best-effort
    /// notifications.
    pub async fn send_reply(&self, target: SocketAddr, reply: &Envelope) -> Result<()> {
        let bytes = reply.encode()?;
        self.main
            .send_to(&bytes, target)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(())
    }

    /// Send `envelope` and wait up to [`REQUEST_TIMEOUT_SECS`] for a reply
    /// whose `aid` matches. Binds a fresh ephemeral socket for the round
    /// trip so a late, stale reply landing on the main socket can never be
    /// mistaken for this request's answer.
    pub async fn send_and_wait(
        &self,
        target: SocketAddr,
        envelope: &Envelope,
    ) -> Result<(Envelope, SocketAddr)> {
        let (socket, _lease) = self.bind_ephemeral().await?;
        let bytes = envelope.encode()?;
        socket
            .send_to(&bytes, target)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let deadline = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        let result = timeout(deadline, self.await_matching_reply(&socket, envelope.aid)).await;
        match result {
            Ok(inner) => inner,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn await_matching_reply(
        &self,
        socket: &UdpSocket,
        expected: crate::auth::AuthToken,
    ) -> Result<(Envelope, SocketAddr)> {
        let mut buf = vec![0u8; crate::envelope::MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            match Envelope::decode(&buf[..len]) {
                Ok(env) if env.aid == expected => return Ok((env, from)),
                Ok(_) => {
                    trace!(%from, "discarding reply for a different request");
                    continue;
                }
                Err(e) => {
                    debug!(%from, error = %e, "dropping malformed datagram while waiting for reply");
                    continue;
                }
            }
        }
    }

    /// Send `envelope` without waiting for any reply, over a fresh ephemeral
    /// socket that is released immediately after the send completes.
    pub async fn send_oneway(&self, target: SocketAddr, envelope: &Envelope) -> Result<()> {
        let (socket, _lease) = self.bind_ephemeral().await?;
        let bytes = envelope.encode()?;
        socket
            .send_to(&bytes, target)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(())
    }

    async fn bind_ephemeral(&self) -> Result<(UdpSocket, PortLease)> {
        for attempt in 0..MAX_BIND_RETRIES {
            let port = self.pool.allocate().ok_or(TransportError::PortsExhausted)?;
            match UdpSocket::bind(SocketAddr::new(self.bind_ip, port)).await {
                Ok(socket) => {
                    return Ok((
                        socket,
                        PortLease {
                            pool: Arc::clone(&self.pool),
                            port,
                        },
                    ))
                }
                Err(e) => {
                    warn!(port, attempt, error = %e, "ephemeral port bind failed, retrying");
                    self.pool.release(port);
                }
            }
        }
        Err(TransportError::PortsExhausted)
    }
}
