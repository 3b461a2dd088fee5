//! Broadcast engine
//!
//! Fan-out is best-effort: every recipient gets its own `try_send` into its
//! own queue, and a failure for one peer is counted and logged without
//! affecting anyone else. The encoded frame is a `Bytes`, so all recipients
//! share one allocation.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::protocol::OutboundMessage;
use crate::registry::{PeerEntry, PeerId, PeerRegistry, RegistryError};
use crate::stats::HubStats;

/// Outcome of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Peers the frame was queued for
    pub delivered: usize,
    /// Peers whose send failed; they are evicted on the next heartbeat tick
    pub failed: usize,
    /// Peers skipped because their channel was already closed
    pub skipped: usize,
}

/// Computes outbound messages and pushes them to registry members
#[derive(Clone)]
pub struct BroadcastEngine {
    registry: Arc<PeerRegistry>,
    stats: Arc<HubStats>,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<PeerRegistry>, stats: Arc<HubStats>) -> Self {
        Self { registry, stats }
    }

    /// Send the current peer count to every open peer
    ///
    /// The count and the recipient list come from the same snapshot, so the
    /// count always equals the registry size at send time.
    pub async fn broadcast_viewer_count(&self) -> FanoutReport {
        let peers = self.registry.snapshot().await;
        let count = peers.len();
        let Some(frame) = encode(&OutboundMessage::ViewerCount { count }) else {
            return FanoutReport::default();
        };

        let report = self.fan_out(&peers, frame, None);
        tracing::debug!(
            viewers = count,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast viewer count"
        );
        report
    }

    /// Relay a payload to every open peer except the sender
    pub async fn broadcast_relay(&self, sender: PeerId, data: Option<Value>) -> FanoutReport {
        let peers = self.registry.snapshot().await;
        let Some(frame) = encode(&OutboundMessage::Relay { data }) else {
            return FanoutReport::default();
        };

        let report = self.fan_out(&peers, frame, Some(sender));
        self.stats.record_relay();
        tracing::debug!(
            sender = %sender,
            delivered = report.delivered,
            failed = report.failed,
            "Relayed message"
        );
        report
    }

    /// Send a message to exactly one peer
    ///
    /// Returns `false` (and logs) if the peer is gone, closed, or its queue
    /// rejected the frame.
    pub async fn send_direct(&self, id: PeerId, message: &OutboundMessage) -> bool {
        let Some(entry) = self.registry.get(id).await else {
            tracing::debug!(peer = %id, "Direct send to unknown peer");
            return false;
        };

        if !entry.is_open() {
            tracing::debug!(peer = %id, "Direct send to closed peer");
            return false;
        }

        let Some(frame) = encode(message) else {
            return false;
        };

        match entry.send(frame) {
            Ok(()) => true,
            Err(e) => {
                self.stats.record_send_failures(1);
                tracing::warn!(peer = %id, error = %e, "Direct send failed");
                false
            }
        }
    }

    /// Whether `id` is currently registered
    pub async fn is_member(&self, id: PeerId) -> bool {
        self.registry.contains(id).await
    }

    /// Register a peer and announce the new count
    pub(crate) async fn register(&self, entry: Arc<PeerEntry>) -> Result<usize, RegistryError> {
        let size = self.registry.register(entry).await?;
        self.stats.record_connect(size);
        self.broadcast_viewer_count().await;
        Ok(size)
    }

    /// Unregister a peer and announce the new count
    ///
    /// Returns the removed entry, or `None` if another path already removed
    /// it (in which case nothing is broadcast).
    pub(crate) async fn unregister(&self, id: PeerId) -> Option<Arc<PeerEntry>> {
        let removed = self.registry.unregister(id).await?;
        self.stats.record_disconnect(removed.remaining);
        self.broadcast_viewer_count().await;
        Some(removed.entry)
    }

    fn fan_out(
        &self,
        peers: &[Arc<PeerEntry>],
        frame: Bytes,
        except: Option<PeerId>,
    ) -> FanoutReport {
        let mut report = FanoutReport::default();

        for entry in peers {
            if Some(entry.id()) == except {
                continue;
            }
            if !entry.is_open() {
                report.skipped += 1;
                continue;
            }

            match entry.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(peer = %entry.id(), error = %e, "Send failed during fan-out");
                }
            }
        }

        self.stats.record_send_failures(report.failed);
        report
    }
}

/// Encode once for every recipient; nothing is sent if encoding fails
fn encode(message: &OutboundMessage) -> Option<Bytes> {
    match message.encode() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode outbound message");
            None
        }
    }
}
