//! Peer entry and liveness state
//!
//! This module defines the per-peer state stored in the registry. The entry
//! owns the peer's channel; everything else reaches the channel through it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::transport::{ChannelError, PeerChannel};

/// Identity of a connected peer
///
/// Allocated from a monotonically increasing counter, so an identity is
/// never reused while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Wrap a raw identity
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identity value
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Liveness of a peer between heartbeat ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LivenessState {
    /// Acknowledged the last probe (or has not been probed yet)
    Alive = 0,
    /// Probed on the last tick, no acknowledgement yet
    AwaitingPong = 1,
}

impl LivenessState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LivenessState::AwaitingPong,
            _ => LivenessState::Alive,
        }
    }
}

/// Entry for a single peer in the registry
pub struct PeerEntry {
    id: PeerId,

    /// Remote address, when the transport knows it
    peer_addr: Option<SocketAddr>,

    channel: Box<dyn PeerChannel>,

    /// `LivenessState` as a `u8`
    liveness: AtomicU8,

    /// Set when a send to this peer failed; evicted on the next tick
    send_failed: AtomicBool,

    /// Guards `channel.close()` so it runs at most once
    closed: AtomicBool,

    connected_at: Instant,
}

impl PeerEntry {
    /// Create a new entry; peers start out `Alive`
    pub fn new(id: PeerId, channel: Box<dyn PeerChannel>) -> Self {
        Self {
            id,
            peer_addr: None,
            channel,
            liveness: AtomicU8::new(LivenessState::Alive as u8),
            send_failed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            connected_at: Instant::now(),
        }
    }

    /// Attach the remote address
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Time since the entry was created
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Current liveness state
    pub fn liveness(&self) -> LivenessState {
        LivenessState::from_u8(self.liveness.load(Ordering::Acquire))
    }

    /// Record a liveness acknowledgement
    ///
    /// Late acknowledgements are accepted too; they just reset the clock.
    pub fn mark_alive(&self) {
        self.liveness
            .store(LivenessState::Alive as u8, Ordering::Release);
    }

    /// Move to `AwaitingPong` ahead of a probe
    ///
    /// Returns the state the peer was in. `AwaitingPong` means the previous
    /// probe went unanswered for a full interval.
    pub fn begin_probe(&self) -> LivenessState {
        let prev = self
            .liveness
            .swap(LivenessState::AwaitingPong as u8, Ordering::AcqRel);
        LivenessState::from_u8(prev)
    }

    /// Whether frames can still be delivered
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.channel.is_open()
    }

    /// Whether a failed send or a dead channel marked this peer for removal
    pub fn needs_eviction(&self) -> bool {
        self.send_failed.load(Ordering::Acquire) || !self.channel.is_open()
    }

    /// Send a text frame
    ///
    /// A failure marks the peer for eviction on the next heartbeat tick.
    pub fn send(&self, frame: Bytes) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }

        self.channel.send(frame).inspect_err(|_| {
            self.send_failed.store(true, Ordering::Release);
        })
    }

    /// Send a liveness probe
    pub fn probe(&self) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }

        self.channel.probe()
    }

    /// Close the channel
    ///
    /// Returns `true` for the call that actually closed it; later calls are
    /// no-ops and return `false`.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.channel.close();
        true
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PeerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerEntry")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("liveness", &self.liveness())
            .field("closed", &self.is_closed())
            .finish()
    }
}
