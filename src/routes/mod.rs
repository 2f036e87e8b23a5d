//! HTTP route definitions and handlers.
//!
//! The demo service exposes a couple of named handlers and a health check,
//! all wrapped by the statsd request hooks.

mod demo_routes;
mod health_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
///
/// Combines all route modules into a single router, attaches the application
/// state and finally instruments every route with the statsd hooks.
pub fn create_router(state: AppState) -> Router {
    let statsd = state.statsd.clone();
    let router = Router::new()
        .merge(demo_routes::routes())
        .merge(health_routes::routes())
        .with_state(state);

    statsd.instrument(router)
}
