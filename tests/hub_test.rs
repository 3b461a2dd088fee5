//! Hub behaviour over in-memory channels

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crowdcast::hub::RouteOutcome;
use crowdcast::transport::{Outbound, QueuedChannel};
use crowdcast::{Hub, PeerId};

struct TestPeer {
    id: PeerId,
    rx: mpsc::Receiver<Outbound>,
}

impl TestPeer {
    async fn connect(hub: &Hub) -> Self {
        let (channel, rx) = QueuedChannel::new(64);
        let id = hub.on_connect(Box::new(channel), None).await.unwrap();
        Self { id, rx }
    }

    /// All JSON frames queued so far
    fn frames(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.rx.try_recv() {
            if let Outbound::Frame(bytes) = cmd {
                out.push(serde_json::from_slice(&bytes).unwrap());
            }
        }
        out
    }

    fn viewer_counts(&mut self) -> Vec<u64> {
        self.frames()
            .into_iter()
            .filter(|f| f["type"] == "viewerCount")
            .filter_map(|f| f["count"].as_u64())
            .collect()
    }
}

#[tokio::test]
async fn test_join_relay_leave_scenario() {
    let hub = Hub::default();

    let mut a = TestPeer::connect(&hub).await;
    assert_eq!(a.viewer_counts(), vec![1]);

    let mut b = TestPeer::connect(&hub).await;
    assert_eq!(a.viewer_counts(), vec![2]);
    assert_eq!(b.viewer_counts(), vec![2]);

    let outcome = hub
        .on_message(b.id, br#"{"type":"message","data":"hi"}"#)
        .await;
    assert!(matches!(outcome, RouteOutcome::Relayed(report) if report.delivered == 1));
    assert_eq!(a.frames(), vec![json!({"type": "message", "data": "hi"})]);
    assert!(b.frames().is_empty());

    hub.on_close(a.id).await;
    assert_eq!(b.viewer_counts(), vec![1]);
}

#[tokio::test]
async fn test_every_membership_change_broadcasts_current_size() {
    let hub = Hub::default();
    let mut peers = Vec::new();

    for expected in 1..=5u64 {
        peers.push(TestPeer::connect(&hub).await);
        for peer in peers.iter_mut() {
            assert_eq!(peer.viewer_counts(), vec![expected]);
        }
    }

    while let Some(gone) = peers.pop() {
        hub.on_close(gone.id).await;
        let expected = peers.len() as u64;
        for peer in peers.iter_mut() {
            assert_eq!(peer.viewer_counts(), vec![expected]);
        }
        assert_eq!(hub.viewer_count().await as u64, expected);
    }
}

#[tokio::test]
async fn test_ping_gets_single_pong() {
    let hub = Hub::default();
    let mut a = TestPeer::connect(&hub).await;
    let mut b = TestPeer::connect(&hub).await;
    a.frames();
    b.frames();

    hub.on_message(a.id, br#"{"type":"ping"}"#).await;

    assert_eq!(a.frames(), vec![json!({"type": "pong"})]);
    assert!(b.frames().is_empty());
}

#[tokio::test]
async fn test_malformed_payloads_change_nothing() {
    let hub = Hub::default();
    let mut a = TestPeer::connect(&hub).await;
    let mut b = TestPeer::connect(&hub).await;
    a.frames();
    b.frames();

    for raw in [&b"{oops"[..], br#"{"kind":"ping"}"#, br#"42"#, b"\xc3\x28"] {
        let outcome = hub.on_message(a.id, raw).await;
        assert!(matches!(outcome, RouteOutcome::Dropped(_)));
    }

    assert!(a.frames().is_empty());
    assert!(b.frames().is_empty());
    assert_eq!(hub.viewer_count().await, 2);
    assert_eq!(hub.stats().decode_errors, 4);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_evicts_silent_peer_and_announces() {
    let interval = Duration::from_secs(30);
    let hub = Hub::new(interval);
    hub.start_heartbeat();

    let mut silent = TestPeer::connect(&hub).await;
    let mut responsive = TestPeer::connect(&hub).await;
    silent.frames();
    responsive.frames();

    // Land just after each tick and answer its probe
    tokio::time::sleep(Duration::from_millis(1)).await;
    for _ in 0..2 {
        tokio::time::sleep(interval).await;
        hub.on_pong(responsive.id).await;
    }

    assert_eq!(hub.viewer_count().await, 1);
    assert_eq!(responsive.viewer_counts(), vec![1]);
    assert_eq!(hub.stats().evictions, 1);

    // The silent peer's channel was closed
    let mut saw_close = false;
    while let Ok(cmd) = silent.rx.try_recv() {
        saw_close |= cmd == Outbound::Close;
    }
    assert!(saw_close);

    hub.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_connects_and_closes() {
    let hub = std::sync::Arc::new(Hub::default());

    let mut handles = Vec::new();
    for i in 0..40 {
        let hub = std::sync::Arc::clone(&hub);
        handles.push(tokio::spawn(async move {
            let (channel, _rx) = QueuedChannel::new(256);
            let id = hub.on_connect(Box::new(channel), None).await.unwrap();
            if i % 2 == 0 {
                hub.on_close(id).await;
                // Racing error after close is a no-op
                hub.on_error(id, &"late").await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(hub.viewer_count().await, 20);
    assert_eq!(hub.stats().total_connections, 40);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_peer_is_force_closed_and_silenced() {
    let interval = Duration::from_secs(30);
    let hub = Hub::new(interval);
    hub.start_heartbeat();

    // Count and confirmation fill this queue; it is never drained
    let (channel, _stalled_rx) = QueuedChannel::new(2);
    let token = channel.close_token();
    let stalled = hub.on_connect(Box::new(channel), None).await.unwrap();
    let mut watcher = TestPeer::connect(&hub).await;
    watcher.frames();

    tokio::time::sleep(Duration::from_millis(1)).await;
    for _ in 0..2 {
        tokio::time::sleep(interval).await;
        hub.on_pong(watcher.id).await;
    }

    assert!(token.is_cancelled());
    assert_eq!(hub.viewer_count().await, 1);
    assert_eq!(watcher.viewer_counts(), vec![1]);

    // Frames already read off its socket are not relayed
    let outcome = hub
        .on_message(stalled, br#"{"type":"message","data":"late"}"#)
        .await;
    assert_eq!(outcome, RouteOutcome::Unregistered);
    assert!(watcher.frames().is_empty());

    hub.shutdown().await;
}
