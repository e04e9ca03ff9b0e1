//! Open-connection bookkeeping for a listener.
//!
//! Every accepted stream holds a [`ConnectionGuard`] until its serving task
//! ends. The guard keeps the listener's open count and the
//! active-connections gauge in step, and names the connection in logs.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Numbers and counts the connections accepted by one listener.
#[derive(Debug)]
pub struct ConnectionTracker {
    listener: &'static str,
    accepted: AtomicU64,
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new(listener: &'static str) -> Self {
        Self {
            listener,
            accepted: AtomicU64::new(0),
            open: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a connection from `peer`; it stays open until the guard drops.
    pub fn track(&self, peer: SocketAddr) -> ConnectionGuard {
        let seq = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        self.open.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();

        let guard = ConnectionGuard {
            listener: self.listener,
            seq,
            peer,
            open: Arc::clone(&self.open),
        };
        tracing::trace!(connection = %guard, peer_addr = %peer, "Connection opened");
        guard
    }

    /// Connections accepted and not yet closed.
    pub fn open(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// One open connection. Displays as `<listener>-<seq>`.
#[derive(Debug)]
pub struct ConnectionGuard {
    listener: &'static str,
    seq: u64,
    peer: SocketAddr,
    open: Arc<AtomicU64>,
}

impl ConnectionGuard {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl fmt::Display for ConnectionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.listener, self.seq)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        tracing::trace!(connection = %self, peer_addr = %self.peer, "Connection closed");
    }
}
