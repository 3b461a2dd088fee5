//! Statistics for the broadcast hub
//!
//! Counters are updated lock-free from every peer task; read them through
//! [`HubStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared by the hub's components
#[derive(Debug)]
pub struct HubStats {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    messages_relayed: AtomicU64,
    send_failures: AtomicU64,
    evictions: AtomicU64,
    decode_errors: AtomicU64,
}

impl HubStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            messages_relayed: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_connect(&self, active: usize) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections
            .store(active as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_disconnect(&self, active: usize) {
        self.active_connections
            .store(active as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_relay(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_failures(&self, count: usize) {
        if count > 0 {
            self.send_failures
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Peers ever registered
    pub total_connections: u64,
    /// Peers currently registered
    pub active_connections: u64,
    /// Relay messages fanned out
    pub messages_relayed: u64,
    /// Individual per-peer send failures
    pub send_failures: u64,
    /// Peers removed by the heartbeat monitor
    pub evictions: u64,
    /// Inbound frames that failed to decode
    pub decode_errors: u64,
    /// Time since the hub was created
    pub uptime: Duration,
}
