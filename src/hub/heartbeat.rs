//! Heartbeat ping/pong liveness monitoring
//!
//! Every tick walks a registry snapshot. A peer still `AwaitingPong` from the
//! previous tick missed a full interval and is evicted; everyone else moves to
//! `AwaitingPong` and gets a fresh probe. A peer that joins mid-interval is
//! first probed on the next tick, so it always has at least one full interval
//! to answer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::registry::{LivenessState, PeerEntry, PeerRegistry};
use crate::stats::HubStats;

use super::engine::BroadcastEngine;

/// Result of one heartbeat tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Peers sent a fresh probe
    pub probed: usize,
    /// Peers removed for missing the previous probe
    pub unresponsive: usize,
    /// Peers removed after a failed send or a dead channel
    pub failed: usize,
}

/// Probes every peer on a fixed interval and evicts the unresponsive ones
#[derive(Clone)]
pub struct HeartbeatMonitor {
    registry: Arc<PeerRegistry>,
    engine: BroadcastEngine,
    stats: Arc<HubStats>,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(
        registry: Arc<PeerRegistry>,
        engine: BroadcastEngine,
        stats: Arc<HubStats>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            engine,
            stats,
            // tokio intervals panic on a zero period
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Probe interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single heartbeat cycle
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for entry in self.registry.snapshot().await {
            if entry.needs_eviction() {
                if self.evict(&entry, "send failed or channel closed").await {
                    report.failed += 1;
                }
                continue;
            }

            match entry.begin_probe() {
                LivenessState::AwaitingPong => {
                    if self.evict(&entry, "no pong within heartbeat interval").await {
                        report.unresponsive += 1;
                    }
                }
                LivenessState::Alive => {
                    if let Err(e) = entry.probe() {
                        // Left in AwaitingPong; the next tick removes it
                        tracing::debug!(peer = %entry.id(), error = %e, "Failed to send probe");
                    }
                    report.probed += 1;
                }
            }
        }

        if report.unresponsive + report.failed > 0 {
            tracing::info!(
                probed = report.probed,
                unresponsive = report.unresponsive,
                failed = report.failed,
                "Heartbeat evicted peers"
            );
        } else {
            tracing::trace!(probed = report.probed, "Heartbeat tick");
        }

        report
    }

    async fn evict(&self, entry: &Arc<PeerEntry>, reason: &'static str) -> bool {
        // Another path (close, error) may have removed it since the snapshot
        if self.engine.unregister(entry.id()).await.is_none() {
            return false;
        }

        entry.close();
        self.stats.record_eviction();
        tracing::info!(peer = %entry.id(), reason, "Evicted peer");
        true
    }

    /// Start ticking in a background task
    ///
    /// The first tick fires one full interval from now.
    pub fn spawn(self) -> HeartbeatHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let start = time::Instant::now() + self.interval;
            let mut ticker = time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }

            tracing::debug!("Heartbeat stopped");
        });

        HeartbeatHandle { cancel, task }
    }
}

/// Handle to a running heartbeat task
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Stop the task and wait for it to finish
    ///
    /// Once this returns no further tick will run.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Heartbeat task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
