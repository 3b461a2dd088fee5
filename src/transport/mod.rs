//! Per-peer channel abstraction
//!
//! The hub never touches sockets. Each accepted connection is handed over as
//! a [`PeerChannel`]: something that can take an outbound text frame, send a
//! liveness probe, report whether it is still open, and be closed.
//!
//! All operations are non-blocking. A channel that cannot take a frame right
//! now reports [`ChannelError::Full`] instead of waiting, so one stalled peer
//! can never hold up a broadcast to everyone else.

pub mod queue;

pub use queue::{Outbound, QueuedChannel};

use bytes::Bytes;

/// Bidirectional message channel to a single peer
pub trait PeerChannel: Send + Sync + 'static {
    /// Queue a text frame for delivery
    fn send(&self, frame: Bytes) -> Result<(), ChannelError>;

    /// Queue a liveness probe (a WebSocket ping frame)
    fn probe(&self) -> Result<(), ChannelError>;

    /// Whether the channel still accepts frames
    fn is_open(&self) -> bool;

    /// Close the channel forcibly
    ///
    /// Callers guarantee this runs at most once per channel.
    fn close(&self);
}

/// Per-peer send failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel has been closed or its writer is gone
    Closed,
    /// The outbound queue is full
    Full,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Closed => write!(f, "Channel closed"),
            ChannelError::Full => write!(f, "Outbound queue full"),
        }
    }
}

impl std::error::Error for ChannelError {}
