//! Application startup and server initialization.
//!
//! This module handles the creation and configuration of the HTTP server,
//! including the statsd client and route setup.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::metrics::Statsd;
use crate::routes;
use crate::state::AppState;

/// Initializes and runs the application server.
///
/// Builds the statsd handle from the configuration, wires the routes and
/// serves them on the configured bind address.
///
/// # Errors
///
/// Returns an error if the statsd configuration is invalid, if the server
/// fails to bind to the specified address, or if it encounters a runtime
/// error during execution.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let statsd = Statsd::new(config.app_name.clone(), config.statsd.clone())?;

    info!(
        app = %config.app_name,
        statsd_enabled = config.statsd.enabled,
        statsd_host = %config.statsd.host,
        statsd_port = config.statsd.port,
        "Starting server on {}",
        config.bind_address
    );

    let state = AppState {
        config: config.clone(),
        statsd,
    };

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
