//! WebSocket transport
//!
//! An axum router answers health checks, upgrades everything else to
//! WebSocket and hands each peer to the [`Hub`](crate::hub::Hub) as a
//! [`QueuedChannel`](crate::transport::QueuedChannel).

pub mod config;
pub mod connection;
pub mod health;
pub mod listener;

pub use config::ServerConfig;
pub use listener::{AppState, BroadcastServer};
