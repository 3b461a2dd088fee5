//! Statistics and metrics

pub mod metrics;

pub use metrics::{HubStats, StatsSnapshot};
