//! Statsd request metrics.
//!
//! This module provides the proxy client, the request hooks and the
//! statsd backend they emit through.

mod backend;
mod client;
mod hooks;
pub mod naming;

pub use backend::{BackendFactory, CadenceBackend, MetricsBackend};
pub use client::{ScopedTimer, Statsd};
pub use hooks::{named, track_requests, Endpoint, RequestContext};
