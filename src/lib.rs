//! Library exports for request-statsd, shared between the binary and tests.
//!
//! Instruments axum request handlers with statsd counters and timers and
//! provides a small proxy client for ad-hoc application metrics.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod startup;
pub mod state;
pub mod utils;

pub use metrics::{named, track_requests, Endpoint, MetricsBackend, ScopedTimer, Statsd};
