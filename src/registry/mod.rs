//! Connection registry
//!
//! The registry is the authoritative set of connected peers. Each entry owns
//! its peer's channel together with the heartbeat state machine for that
//! peer:
//!
//! ```text
//!                      Arc<PeerRegistry>
//!                 ┌──────────────────────────┐
//!                 │ peers: HashMap<PeerId,   │
//!                 │   PeerEntry {            │
//!                 │     channel,             │
//!                 │     liveness: Alive |    │
//!                 │       AwaitingPong,      │
//!                 │   }                      │
//!                 │ >                        │
//!                 └────────────┬─────────────┘
//!                              │ snapshot()
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!   [HeartbeatMonitor]  [BroadcastEngine]    [MessageRouter]
//! ```
//!
//! Membership changes do not broadcast by themselves; the `Hub` pairs every
//! successful register/unregister with a viewer-count broadcast.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{LivenessState, PeerEntry, PeerId};
pub use error::RegistryError;
pub use store::{PeerRegistry, Unregistered};
