//! # crowdcast
//!
//! Live viewer counts and chat relay over WebSockets.
//!
//! Every connected client is a peer in a shared registry. Whenever someone
//! joins or leaves, all peers receive the new viewer count; messages a peer
//! sends are relayed to everyone else; a heartbeat probes every peer on a
//! fixed interval and drops the ones that stop answering.
//!
//! ```no_run
//! use crowdcast::{BroadcastServer, ServerConfig};
//!
//! # async fn example() -> crowdcast::Result<()> {
//! let config = ServerConfig::with_addr("0.0.0.0:8080".parse().unwrap());
//! let server = BroadcastServer::new(config);
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```
//!
//! The [`Hub`] is transport-agnostic: anything implementing
//! [`PeerChannel`](transport::PeerChannel) can be connected to it, which is
//! also how the tests drive it without sockets.

pub mod error;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;
pub mod transport;

pub use error::{Error, Result};
pub use hub::Hub;
pub use registry::PeerId;
pub use server::{BroadcastServer, ServerConfig};
