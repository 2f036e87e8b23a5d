use std::sync::Arc;

use request_statsd::config::{load_config, print_schema};
use request_statsd::startup;
use request_statsd::utils::logger::init_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    if std::env::args().skip(1).any(|arg| arg == "--schema") {
        print_schema();
        return;
    }

    let config = Arc::new(load_config());
    init_logging(&config.logging);

    if let Err(e) = startup::run(config).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }
}
