//! Connection registry
//!
//! Tracks active connections so the server can enforce its client limit.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Registry of active connections, keyed by peer address
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<SocketAddr, Instant>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: SocketAddr) {
        self.clients.insert(addr, Instant::now());
    }

    /// Remove a connection, returning how long it was registered
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Duration> {
        self.clients.remove(addr).map(|since| since.elapsed())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
