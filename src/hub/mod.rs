//! Broadcast hub
//!
//! The hub owns the connection registry and the three components that work
//! against it:
//!
//! - [`BroadcastEngine`]: viewer-count broadcasts, relays, direct replies
//! - [`MessageRouter`]: decodes inbound frames and dispatches by kind
//! - [`HeartbeatMonitor`]: periodic probes and eviction of silent peers
//!
//! ```text
//!  transport ──on_connect──► Hub ──register──► PeerRegistry
//!            ──on_message──►  │  ──route────► MessageRouter ──► BroadcastEngine
//!            ──on_pong─────►  │  ──mark_alive► PeerEntry
//!            ──on_close────►  │  ──unregister► PeerRegistry ──► viewer count
//!                             └── HeartbeatMonitor (background task)
//! ```

pub mod engine;
pub mod events;
pub mod heartbeat;
pub mod router;

pub use engine::{BroadcastEngine, FanoutReport};
pub use events::Hub;
pub use heartbeat::{HeartbeatHandle, HeartbeatMonitor, TickReport};
pub use router::{MessageRouter, RouteOutcome};
