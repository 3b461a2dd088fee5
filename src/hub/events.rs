//! Hub: the entry point the transport layer talks to

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::constants::DEFAULT_HEARTBEAT_INTERVAL;
use crate::protocol::OutboundMessage;
use crate::registry::{PeerEntry, PeerId, PeerRegistry};
use crate::stats::{HubStats, StatsSnapshot};
use crate::transport::PeerChannel;

use super::engine::BroadcastEngine;
use super::heartbeat::{HeartbeatHandle, HeartbeatMonitor};
use super::router::{MessageRouter, RouteOutcome};

/// Connection registry plus the components operating on it
///
/// The transport calls `on_connect` with an accepted channel and then feeds
/// that peer's events (`on_message`, `on_pong`, `on_close`, `on_error`) back
/// in under the returned `PeerId`. The hub behaves the same whatever
/// transport wraps it.
pub struct Hub {
    registry: Arc<PeerRegistry>,
    engine: BroadcastEngine,
    router: MessageRouter,
    monitor: HeartbeatMonitor,
    stats: Arc<HubStats>,
    next_peer_id: AtomicU64,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
    shutdown: CancellationToken,
}

impl Hub {
    /// Create a hub; call [`Hub::start_heartbeat`] to begin liveness checks
    pub fn new(heartbeat_interval: Duration) -> Self {
        let registry = Arc::new(PeerRegistry::new());
        let stats = Arc::new(HubStats::new());
        let engine = BroadcastEngine::new(Arc::clone(&registry), Arc::clone(&stats));
        let router = MessageRouter::new(engine.clone(), Arc::clone(&stats));
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&registry),
            engine.clone(),
            Arc::clone(&stats),
            heartbeat_interval,
        );

        Self {
            registry,
            engine,
            router,
            monitor,
            stats,
            next_peer_id: AtomicU64::new(1),
            heartbeat: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &BroadcastEngine {
        &self.engine
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of connected peers
    pub async fn viewer_count(&self) -> usize {
        self.registry.len().await
    }

    /// Token cancelled when shutdown begins
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Spawn the heartbeat task
    ///
    /// Must be called from within a Tokio runtime. Calling it again while
    /// the task runs, or after shutdown, does nothing.
    pub fn start_heartbeat(&self) {
        // Checked under the lock: `shutdown` cancels before taking the slot,
        // so a handle stored here is always seen and stopped by it.
        let mut slot = self.heartbeat.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_shutting_down() {
            return;
        }

        if slot.is_none() {
            tracing::debug!(interval = ?self.monitor.interval(), "Starting heartbeat");
            *slot = Some(self.monitor.clone().spawn());
        }
    }

    /// Register a newly accepted channel
    ///
    /// Broadcasts the new viewer count to everyone (the new peer included)
    /// and then sends the new peer its connection confirmation.
    pub async fn on_connect(
        &self,
        channel: Box<dyn PeerChannel>,
        peer_addr: Option<SocketAddr>,
    ) -> Result<PeerId> {
        if self.is_shutting_down() {
            channel.close();
            return Err(Error::ShuttingDown);
        }

        let id = PeerId::new(self.next_peer_id.fetch_add(1, Ordering::Relaxed));
        let mut entry = PeerEntry::new(id, channel);
        if let Some(addr) = peer_addr {
            entry = entry.with_peer_addr(addr);
        }
        let entry = Arc::new(entry);

        let viewers = self.engine.register(Arc::clone(&entry)).await?;

        // Shutdown may have drained the registry while we were registering
        if self.is_shutting_down() {
            self.registry.unregister(id).await;
            entry.close();
            return Err(Error::ShuttingDown);
        }

        tracing::info!(peer = %id, addr = ?peer_addr, viewers, "Peer connected");
        self.engine.send_direct(id, &OutboundMessage::connected()).await;

        Ok(id)
    }

    /// Handle a frame received from a peer
    pub async fn on_message(&self, id: PeerId, raw: &[u8]) -> RouteOutcome {
        self.router.route(id, raw).await
    }

    /// Handle a liveness acknowledgement
    pub async fn on_pong(&self, id: PeerId) {
        if let Some(entry) = self.registry.get(id).await {
            entry.mark_alive();
        }
    }

    /// Handle the transport reporting the channel closed
    ///
    /// Returns `false` if the peer had already been removed (for example by
    /// heartbeat eviction).
    pub async fn on_close(&self, id: PeerId) -> bool {
        let Some(entry) = self.engine.unregister(id).await else {
            return false;
        };

        let viewers = self.registry.len().await;
        tracing::info!(
            peer = %id,
            addr = ?entry.peer_addr(),
            connected_secs = entry.connected_for().as_secs(),
            viewers,
            "Peer disconnected"
        );
        true
    }

    /// Handle a transport error on a peer's channel
    ///
    /// The peer is removed and its channel closed.
    pub async fn on_error<E>(&self, id: PeerId, error: &E) -> bool
    where
        E: std::fmt::Display + Sync + ?Sized,
    {
        tracing::warn!(peer = %id, error = %error, "Peer channel error");

        let Some(entry) = self.engine.unregister(id).await else {
            return false;
        };
        entry.close();
        true
    }

    /// Stop the heartbeat and close every remaining peer
    ///
    /// Idempotent. Each channel is closed exactly once and no heartbeat tick
    /// runs after this returns.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self
            .heartbeat
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }

        let peers = self.registry.drain().await;
        let closed = peers.iter().filter(|entry| entry.close()).count();
        self.stats.record_disconnect(0);

        if closed > 0 {
            tracing::info!(closed, "Hub shut down");
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio_test::assert_err;

    use super::*;
    use crate::transport::{Outbound, QueuedChannel};

    async fn connect(hub: &Hub) -> (PeerId, mpsc::Receiver<Outbound>) {
        let (channel, rx) = QueuedChannel::new(32);
        let id = hub.on_connect(Box::new(channel), None).await.unwrap();
        (id, rx)
    }

    fn frames(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            if let Outbound::Frame(bytes) = cmd {
                out.push(serde_json::from_slice(&bytes).unwrap());
            }
        }
        out
    }

    #[tokio::test]
    async fn test_connect_announces_and_confirms() {
        let hub = Hub::default();
        let (_a, mut rx) = connect(&hub).await;

        assert_eq!(
            frames(&mut rx),
            vec![
                json!({"type": "viewerCount", "count": 1}),
                json!({"type": "connection", "status": "connected"}),
            ]
        );
        assert_eq!(hub.stats().total_connections, 1);
    }

    #[tokio::test]
    async fn test_identities_are_unique() {
        let hub = Hub::default();
        let (a, _rxa) = connect(&hub).await;
        let (b, _rxb) = connect(&hub).await;
        assert_ne!(a, b);
        assert_eq!(hub.viewer_count().await, 2);
    }

    #[tokio::test]
    async fn test_close_then_error_removes_once() {
        let hub = Hub::default();
        let (a, _rxa) = connect(&hub).await;
        let (_b, mut rxb) = connect(&hub).await;
        frames(&mut rxb);

        assert!(hub.on_close(a).await);
        assert!(!hub.on_error(a, &"late error").await);
        assert!(!hub.on_close(a).await);

        // Exactly one count update for the one removal
        assert_eq!(frames(&mut rxb), vec![json!({"type": "viewerCount", "count": 1})]);
    }

    #[tokio::test]
    async fn test_error_closes_channel() {
        let hub = Hub::default();
        let (a, mut rxa) = connect(&hub).await;
        frames(&mut rxa);

        assert!(hub.on_error(a, &"reset by peer").await);
        assert_eq!(rxa.try_recv(), Ok(Outbound::Close));
        assert_eq!(hub.viewer_count().await, 0);
    }

    #[tokio::test]
    async fn test_pong_resets_liveness() {
        let hub = Hub::default();
        let (a, _rxa) = connect(&hub).await;
        let entry = hub.registry().get(a).await.unwrap();

        entry.begin_probe();
        hub.on_pong(a).await;
        assert_eq!(entry.liveness(), crate::registry::LivenessState::Alive);

        // Pong for an unknown peer is ignored
        hub.on_pong(PeerId::new(999)).await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_everyone_once() {
        let hub = Hub::default();
        hub.start_heartbeat();
        let (_a, mut rxa) = connect(&hub).await;
        let (_b, mut rxb) = connect(&hub).await;
        frames(&mut rxa);
        frames(&mut rxb);

        hub.shutdown().await;
        hub.shutdown().await;

        assert_eq!(rxa.try_recv(), Ok(Outbound::Close));
        assert!(rxa.try_recv().is_err());
        assert_eq!(rxb.try_recv(), Ok(Outbound::Close));
        assert!(rxb.try_recv().is_err());
        assert_eq!(hub.viewer_count().await, 0);
        assert_eq!(hub.stats().active_connections, 0);
    }

    #[tokio::test]
    async fn test_connect_after_shutdown_is_rejected() {
        let hub = Hub::default();
        hub.shutdown().await;

        let (channel, mut rx) = QueuedChannel::new(4);
        let err = assert_err!(hub.on_connect(Box::new(channel), None).await);
        assert!(matches!(err, Error::ShuttingDown));
        assert_eq!(rx.try_recv(), Ok(Outbound::Close));
        assert_eq!(hub.viewer_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_heartbeat_after_shutdown_is_noop() {
        let hub = Hub::default();
        hub.shutdown().await;
        hub.start_heartbeat();
        assert!(hub.heartbeat.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_running_heartbeat() {
        let hub = Hub::default();
        hub.start_heartbeat();
        hub.start_heartbeat();
        assert!(hub.heartbeat.lock().unwrap().is_some());

        hub.shutdown().await;

        assert!(hub.heartbeat.lock().unwrap().is_none());
        hub.start_heartbeat();
        assert!(hub.heartbeat.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_on_stalled_peer_forces_close() {
        let hub = Hub::default();
        let (channel, mut rx) = QueuedChannel::new(2);
        let token = channel.close_token();
        let a = hub.on_connect(Box::new(channel), None).await.unwrap();

        // Count and confirmation fill the queue; nothing is being drained
        assert!(hub.on_error(a, &"write stalled").await);

        assert!(token.is_cancelled());
        assert_eq!(frames(&mut rx).len(), 2);
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.viewer_count().await, 0);
    }

    #[tokio::test]
    async fn test_frames_after_error_are_discarded() {
        let hub = Hub::default();
        let (a, _rxa) = connect(&hub).await;
        let (_b, mut rxb) = connect(&hub).await;
        frames(&mut rxb);

        hub.on_error(a, &"reset by peer").await;
        frames(&mut rxb);

        let outcome = hub
            .on_message(a, br#"{"type":"message","data":"ghost"}"#)
            .await;
        assert_eq!(outcome, RouteOutcome::Unregistered);
        assert!(frames(&mut rxb).is_empty());
    }
}
