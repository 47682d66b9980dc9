//! Statistics and metrics
//!
//! Provides observability into handshake sessions and the acceptor.

pub mod metrics;

pub use metrics::{ServerStats, ServerStatsSnapshot, SessionStats};
