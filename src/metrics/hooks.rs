//! Request lifecycle hooks.
//!
//! Each request moves through `NOT_STARTED -> TIMED -> REPORTED`:
//! [`Statsd::before_request`] stamps the start instant on a per-request
//! [`RequestContext`], the handler runs, then [`Statsd::after_request`] emits
//! one timer and one counter named after the route and response status.
//! [`track_requests`] composes both around an axum handler.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use futures::FutureExt;
use tracing::{debug, error};

use super::client::Statsd;
use super::naming;
use crate::config::NamingStrategy;

/// Logical name of a route, used by [`NamingStrategy::Endpoint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Write-once endpoint cell shared between [`track_requests`] and the
/// [`named`] layer of the route that ends up handling the request.
#[derive(Clone, Default)]
struct EndpointSlot(Arc<OnceLock<Endpoint>>);

/// Per-request bookkeeping, created for one request and dropped with it.
pub struct RequestContext {
    started: Option<Instant>,
    path: String,
    matched: bool,
    endpoint: EndpointSlot,
}

impl RequestContext {
    /// Context for a request to `path`; `matched` tells whether a route
    /// matched it.
    pub fn new(path: impl Into<String>, matched: bool) -> Self {
        Self {
            started: None,
            path: path.into(),
            matched,
            endpoint: EndpointSlot::default(),
        }
    }

    /// Builds the context for `request` and hands it the endpoint slot.
    fn attach(request: &mut Request) -> Self {
        let ctx = Self::new(
            request.uri().path(),
            request.extensions().get::<MatchedPath>().is_some(),
        );
        request.extensions_mut().insert(ctx.endpoint.clone());
        ctx
    }

    /// Records the endpoint name. Only the first name sticks.
    pub fn set_endpoint(&self, endpoint: Endpoint) {
        let _ = self.endpoint.0.set(endpoint);
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.0.get()
    }

    pub fn started(&self) -> Option<Instant> {
        self.started
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Statsd {
    /// `NOT_STARTED -> TIMED`.
    pub fn before_request(&self, ctx: &mut RequestContext) {
        ctx.started = Some(Instant::now());
    }

    /// `TIMED -> REPORTED`. Returns whether anything was emitted.
    ///
    /// Nothing is emitted when the request was never timed, when the
    /// configured rate is zero, or when no metric name can be derived.
    pub fn after_request(&self, ctx: &RequestContext, status: StatusCode) -> bool {
        let Some(started) = ctx.started else {
            debug!(path = %ctx.path, "request was never timed, skipping metrics");
            return false;
        };
        if self.config().rate == 0.0 {
            return false;
        }
        let Some(name) = self.request_metric_name(ctx, status) else {
            debug!(path = %ctx.path, "no endpoint for request, skipping metrics");
            return false;
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.timing(&name, elapsed_ms, None);
        self.incr(&name, 1, None);
        true
    }

    fn request_metric_name(&self, ctx: &RequestContext, status: StatusCode) -> Option<String> {
        match self.config().naming {
            NamingStrategy::Endpoint => ctx
                .endpoint()
                .map(|endpoint| naming::endpoint_metric(endpoint.as_str(), status.as_u16())),
            // a 405 means the path matched but no handler ran
            NamingStrategy::Path if ctx.matched && status != StatusCode::METHOD_NOT_ALLOWED => {
                Some(naming::path_metric(&ctx.path, Some(status.as_u16())))
            }
            NamingStrategy::Path => None,
        }
    }
}

/// Middleware running the before and after hooks around the handler.
///
/// Install it with [`Statsd::instrument`]. A panicking handler is reported
/// as a 500 before the panic continues to unwind.
pub async fn track_requests(
    State(statsd): State<Statsd>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut ctx = RequestContext::attach(&mut request);
    statsd.before_request(&mut ctx);

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => {
            statsd.after_request(&ctx, response.status());
            response
        }
        Err(panic) => {
            error!(path = %ctx.path, "request handler panicked");
            statsd.after_request(&ctx, StatusCode::INTERNAL_SERVER_ERROR);
            std::panic::resume_unwind(panic)
        }
    }
}

/// Gives `route` the endpoint name `name` for request metrics.
///
/// ```no_run
/// use axum::{routing::get, Router};
/// use request_statsd::named;
///
/// async fn index() -> &'static str { "OK" }
///
/// let router: Router = Router::new().route("/", named("index", get(index)));
/// ```
pub fn named<S>(name: &str, route: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let endpoint = Endpoint::new(name);
    // route_layer leaves the 405 fallback unnamed, so wrong-method requests
    // are not reported
    route.route_layer(middleware::from_fn(move |request: Request, next: Next| {
        let endpoint = endpoint.clone();
        async move {
            if let Some(slot) = request.extensions().get::<EndpointSlot>() {
                let _ = slot.0.set(endpoint);
            }
            next.run(request).await
        }
    }))
}
