//! Shared application state.
//!
//! Contains the state that is shared across all request handlers.

use crate::config::ConfigV1;
use crate::metrics::Statsd;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request handler and contains
/// references to the configuration and the statsd client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Statsd proxy for ad-hoc metrics, shared with the request hooks.
    pub statsd: Statsd,
}
