//! Statistics and metrics for the broadcast pipeline

pub mod metrics;

pub use metrics::{BroadcastStats, StatsSnapshot};
