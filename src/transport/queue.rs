//! Bounded-queue channel
//!
//! [`QueuedChannel`] is the sending half; the receiving half is drained by
//! whatever owns the socket (the WebSocket writer task in `server`, or a test).
//! Per-peer ordering follows from the queue being FIFO.
//!
//! Closing also cancels the channel's [`CancellationToken`]. The socket owner
//! watches that token, so a forced close takes effect even when the queue is
//! full and the `Close` command cannot be queued behind the backlog.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::{ChannelError, PeerChannel};

/// Command for a peer's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// JSON text frame
    Frame(Bytes),
    /// Liveness probe
    Ping,
    /// Close the connection; nothing follows
    Close,
}

/// Channel backed by a bounded `mpsc` queue
#[derive(Debug)]
pub struct QueuedChannel {
    tx: mpsc::Sender<Outbound>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl QueuedChannel {
    /// Create a channel and the receiver its writer drains
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let channel = Self {
            tx,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        };
        (channel, rx)
    }

    /// Token cancelled when the channel is closed
    ///
    /// The socket owner cancels it too when the connection ends on its own.
    pub fn close_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn push(&self, cmd: Outbound) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }

        self.tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

impl PeerChannel for QueuedChannel {
    fn send(&self, frame: Bytes) -> Result<(), ChannelError> {
        self.push(Outbound::Frame(frame))
    }

    fn probe(&self) -> Result<(), ChannelError> {
        self.push(Outbound::Ping)
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
            && !self.shutdown.is_cancelled()
            && !self.tx.is_closed()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Best effort: a stalled writer has a full queue, the token covers it
        let _ = self.tx.try_send(Outbound::Close);
        self.shutdown.cancel();
    }
}
