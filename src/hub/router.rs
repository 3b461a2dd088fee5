//! Inbound message routing
//!
//! Errors here stay local: a frame that fails to decode is logged and
//! dropped, and the sender's connection stays open.

use std::sync::Arc;

use crate::protocol::{DecodeError, InboundMessage, OutboundMessage};
use crate::registry::PeerId;
use crate::stats::HubStats;

use super::engine::{BroadcastEngine, FanoutReport};

/// What happened to an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Answered the sender directly (`ping` → `pong`)
    Replied { delivered: bool },
    /// Relayed to the other peers
    Relayed(FanoutReport),
    /// Well-formed but of a kind this server does not handle
    Ignored,
    /// Failed to decode
    Dropped(DecodeError),
    /// Sender is no longer registered (evicted, errored or closed)
    Unregistered,
}

/// Dispatches decoded peer messages to the broadcast engine
#[derive(Clone)]
pub struct MessageRouter {
    engine: BroadcastEngine,
    stats: Arc<HubStats>,
}

impl MessageRouter {
    pub fn new(engine: BroadcastEngine, stats: Arc<HubStats>) -> Self {
        Self { engine, stats }
    }

    /// Route one raw frame received from `sender`
    ///
    /// Frames still in flight from a peer that has already been removed are
    /// discarded without being decoded.
    pub async fn route(&self, sender: PeerId, raw: &[u8]) -> RouteOutcome {
        if !self.engine.is_member(sender).await {
            tracing::debug!(peer = %sender, len = raw.len(), "Discarding frame from removed peer");
            return RouteOutcome::Unregistered;
        }

        let message = match InboundMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                self.stats.record_decode_error();
                tracing::warn!(peer = %sender, error = %e, len = raw.len(), "Dropping malformed message");
                return RouteOutcome::Dropped(e);
            }
        };

        match message {
            InboundMessage::Ping => {
                let delivered = self.engine.send_direct(sender, &OutboundMessage::Pong).await;
                RouteOutcome::Replied { delivered }
            }
            InboundMessage::Relay { data } => {
                RouteOutcome::Relayed(self.engine.broadcast_relay(sender, data).await)
            }
            InboundMessage::Unknown => {
                tracing::trace!(peer = %sender, "Ignoring unknown message kind");
                RouteOutcome::Ignored
            }
        }
    }
}
