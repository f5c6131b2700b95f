//! Live server counters
//!
//! Each server exposes the number of currently connected clients so a
//! control surface can display it. Sessions increment on accept and
//! decrement when they finish, from whatever task they ran on.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Connection counter shared between a server and its session tasks.
#[derive(Debug, Default)]
pub struct ServerStats {
    connections: AtomicUsize,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open client connections.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}
