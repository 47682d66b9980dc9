//! Statistics and metrics for handshake sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session-level statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total bytes received
    pub bytes_received: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Time spent in the handshake
    pub duration: Duration,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_received(&mut self, n: usize) {
        self.bytes_received += n as u64;
    }

    pub fn add_sent(&mut self, n: usize) {
        self.bytes_sent += n as u64;
    }
}

/// Server-wide counters, shared by the acceptor and every session task
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    accepted: AtomicU64,
    rejected: AtomicU64,
    active: AtomicU64,
    established: AtomicU64,
    validation_failures: AtomicU64,
    transport_failures: AtomicU64,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            active: AtomicU64::new(0),
            established: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn on_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_session_start(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Connection refused before a session started (limit or handler)
    pub(crate) fn on_reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_established(&self) {
        self.established.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Session left the handshake, either handed off or torn down
    pub(crate) fn on_close(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            established: self.established.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Plain copy of [`ServerStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    /// Total connections ever accepted
    pub accepted: u64,
    /// Connections closed before the handshake started
    pub rejected: u64,
    /// Sessions currently handshaking
    pub active: u64,
    /// Handshakes that reached `Established`
    pub established: u64,
    /// Handshakes failed by a bad C0 or C2
    pub validation_failures: u64,
    /// Handshakes failed by disconnect, I/O error or timeout
    pub transport_failures: u64,
    /// Uptime
    pub uptime: Duration,
}
