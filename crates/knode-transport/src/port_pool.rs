//! A pool of ephemeral source ports for outbound requests.
//!
//! Using a bounded pool rather than letting the OS pick an ephemeral port
//! lets a reply be correlated back to a listening socket even across the
//! request's lifetime, and bounds the number of sockets a node holds open
//! concurrently.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Default number of ports carved out of the ephemeral range.
pub const DEFAULT_POOL_SIZE: u16 = 100;

/// A pool of ports available for lease. Backed by a plain [`std::sync::Mutex`]
/// (not `tokio::sync::Mutex`) since every critical section here is a simple
/// non-blocking queue operation — no `.await` ever happens while it's held,
/// so a [`PortLease`]'s `Drop` impl can release its port synchronously.
pub struct PortPool {
    free: Mutex<VecDeque<u16>>,
}

impl PortPool {
    /// Build a pool covering `base..base + size`.
    pub fn new(base: u16, size: u16) -> Self {
        let free = (0..size).map(|i| base + i).collect();
        Self {
            free: Mutex::new(free),
        }
    }

    /// Build a pool of [`DEFAULT_POOL_SIZE`] ports starting at `base`.
    pub fn with_default_size(base: u16) -> Self {
        Self::new(base, DEFAULT_POOL_SIZE)
    }

    /// Take a port from the pool, if any are free.
    pub fn allocate(&self) -> Option<u16> {
        self.free.lock().expect("port pool mutex poisoned").pop_front()
    }

    /// Return a port to the pool.
    pub fn release(&self, port: u16) {
        self.free.lock().expect("port pool mutex poisoned").push_back(port);
    }

    /// Number of ports currently free.
    pub fn available(&self) -> usize {
        self.free.lock().expect("port pool mutex poisoned").len()
    }
}
