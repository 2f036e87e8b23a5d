//! Example handlers reporting ad-hoc metrics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Router, routing::get};
use tracing::debug;

use crate::metrics::named;
use crate::state::AppState;

/// Registers the demo routes under their endpoint names.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", named("index", get(index)))
        .route("/fail", named("fail", get(fail)))
}

/// Counts `doing_stuff` and times `doing_more_stuff`.
async fn index(State(state): State<AppState>) -> impl IntoResponse {
    state.statsd.incr("doing_stuff", 1, None);
    debug!("doing stuff");

    {
        let _timer = state.statsd.timer("doing_more_stuff", None);
        debug!("doing more stuff");
    }

    (StatusCode::OK, "OK")
}

async fn fail() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "FAIL")
}
