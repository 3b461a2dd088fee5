//! WebSocket connection handling
//!
//! Each upgraded socket runs two halves:
//!
//! - a writer task draining the peer's [`QueuedChannel`] into the socket
//!   (text frames and pings)
//! - the reader loop below, feeding frames, pongs, close and errors into
//!   the [`Hub`]
//!
//! Both halves watch the channel's close token. The hub cancels it when it
//! closes the peer (eviction, error, shutdown) and the writer cancels it
//! when the socket stops accepting writes, so either side ending stops the
//! other even if the writer is stuck behind a full queue.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio_util::sync::CancellationToken;

use crate::hub::Hub;
use crate::protocol::constants::CLOSE_FRAME_TIMEOUT;
use crate::server::listener::AppState;
use crate::transport::{Outbound, QueuedChannel};

type WsSink = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler
///
/// Upgrades on any path. When `max_connections` is reached the upgrade is
/// refused with `503` and the socket never reaches the hub.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let permit = match state.connection_semaphore {
        Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        },
        None => None,
    };

    let queue_capacity = state.send_queue_capacity;
    let hub = state.hub;

    ws.on_upgrade(move |socket| {
        Connection::new(socket, peer_addr, queue_capacity, hub, permit).run()
    })
}

/// A single upgraded WebSocket client connection
pub struct Connection {
    socket: WebSocket,
    peer_addr: SocketAddr,
    queue_capacity: usize,
    hub: Arc<Hub>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Connection {
    pub fn new(
        socket: WebSocket,
        peer_addr: SocketAddr,
        queue_capacity: usize,
        hub: Arc<Hub>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            socket,
            peer_addr,
            queue_capacity,
            hub,
            _permit: permit,
        }
    }

    /// Run the connection until either side closes it
    pub async fn run(self) {
        let Connection {
            socket,
            peer_addr,
            queue_capacity,
            hub,
            _permit,
        } = self;

        let (sink, mut stream) = socket.split();
        let (channel, outbound_rx) = QueuedChannel::new(queue_capacity);
        let closed = channel.close_token();
        let writer = tokio::spawn(write_loop(sink, outbound_rx, closed.clone()));

        let id = match hub.on_connect(Box::new(channel), Some(peer_addr)).await {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection refused by hub");
                let _ = writer.await;
                return;
            }
        };

        let mut errored = false;
        loop {
            tokio::select! {
                biased;
                () = closed.cancelled() => break,
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        hub.on_message(id, text.as_str().as_bytes()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        hub.on_message(id, &data).await;
                    }
                    Some(Ok(Message::Pong(_))) => hub.on_pong(id).await,
                    // axum answers pings itself
                    Some(Ok(Message::Ping(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(frame) => tracing::debug!(
                                peer = %id,
                                code = frame.code,
                                reason = frame.reason.as_str(),
                                "Client sent close frame"
                            ),
                            None => tracing::debug!(peer = %id, "Client sent close frame"),
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        hub.on_error(id, &e).await;
                        errored = true;
                        break;
                    }
                    None => break,
                },
            }
        }

        if !errored {
            hub.on_close(id).await;
        }

        closed.cancel();
        let _ = writer.await;

        tracing::debug!(peer = %id, addr = %peer_addr, "Connection closed");
    }
}

async fn write_loop(
    mut sink: WsSink,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    closed: CancellationToken,
) {
    loop {
        let cmd = tokio::select! {
            biased;
            () = closed.cancelled() => break,
            cmd = outbound_rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };

        let msg = match cmd {
            Outbound::Frame(frame) => match Utf8Bytes::try_from(frame) {
                Ok(text) => Message::Text(text),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping non UTF-8 outbound frame");
                    continue;
                }
            },
            Outbound::Ping => Message::Ping(Bytes::new()),
            Outbound::Close => break,
        };

        // A peer that stopped reading blocks here until the channel is closed
        let sent = tokio::select! {
            biased;
            () = closed.cancelled() => break,
            sent = sink.send(msg) => sent,
        };
        if let Err(e) = sent {
            tracing::debug!(error = %e, "WebSocket write failed");
            break;
        }
    }

    let _ = tokio::time::timeout(CLOSE_FRAME_TIMEOUT, async {
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    })
    .await;

    closed.cancel();
}
