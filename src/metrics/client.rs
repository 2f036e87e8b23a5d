//! Application-facing statsd proxy.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::Router;

use super::backend::{BackendFactory, CadenceBackend, MetricsBackend};
use super::hooks::track_requests;
use super::naming;
use crate::config::StatsdConfig;
use crate::error::ConfigError;

/// Per-application statsd handle.
///
/// Cloning is cheap and every clone shares the same lazily built backend, so
/// the handle can live in axum state and be passed to handlers. Independent
/// applications in one process each own their own handle.
///
/// Ad-hoc metrics are named `<app_name>.<stat>`; the statsd client adds the
/// configured prefix in front of that.
#[derive(Clone)]
pub struct Statsd {
    inner: Arc<Inner>,
}

struct Inner {
    app_name: String,
    config: StatsdConfig,
    factory: BackendFactory,
    backend: OnceLock<Arc<dyn MetricsBackend>>,
}

impl Statsd {
    /// Validates `config` and prepares a handle backed by a UDP statsd client.
    ///
    /// No socket is opened until the first metric is emitted.
    pub fn new(app_name: impl Into<String>, config: StatsdConfig) -> Result<Self, ConfigError> {
        Self::with_backend_factory(app_name, config, CadenceBackend::factory())
    }

    /// Like [`Statsd::new`] but builds the backend through `factory`.
    pub fn with_backend_factory(
        app_name: impl Into<String>,
        config: StatsdConfig,
        factory: BackendFactory,
    ) -> Result<Self, ConfigError> {
        let app_name = app_name.into();
        if app_name.trim().is_empty() {
            return Err(ConfigError::EmptyAppName);
        }
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                app_name,
                config,
                factory,
                backend: OnceLock::new(),
            }),
        })
    }

    pub fn app_name(&self) -> &str {
        &self.inner.app_name
    }

    pub fn config(&self) -> &StatsdConfig {
        &self.inner.config
    }

    /// Emits a counter increment of `count` for `<app>.<stat>`.
    ///
    /// Like every emitting call, this is a no-op when statsd is disabled.
    pub fn incr(&self, stat: &str, count: i64, rate: Option<f64>) {
        if !self.inner.config.enabled {
            return;
        }
        self.client()
            .incr(&self.metric_name(stat), count, self.resolve_rate(rate));
    }

    /// Same as `incr(stat, -count, rate)`.
    pub fn decr(&self, stat: &str, count: i64, rate: Option<f64>) {
        self.incr(stat, -count, rate);
    }

    /// Emits a timer sample of `delta_ms` milliseconds for `<app>.<stat>`.
    pub fn timing(&self, stat: &str, delta_ms: u64, rate: Option<f64>) {
        if !self.inner.config.enabled {
            return;
        }
        self.client()
            .timing(&self.metric_name(stat), delta_ms, self.resolve_rate(rate));
    }

    /// Starts a timer that emits one `timing` sample for `<app>.<stat>` when
    /// dropped, including when dropped by a panic unwinding through the scope.
    ///
    /// ```no_run
    /// # fn demo(statsd: &request_statsd::Statsd) {
    /// {
    ///     let _timer = statsd.timer("doing_more_stuff", None);
    ///     // timed work
    /// }
    /// # }
    /// ```
    #[must_use = "the timer reports when dropped; binding it to `_` drops it immediately"]
    pub fn timer(&self, stat: &str, rate: Option<f64>) -> ScopedTimer {
        ScopedTimer {
            statsd: self.clone(),
            stat: stat.to_string(),
            rate,
            started: Instant::now(),
        }
    }

    /// Installs the request hooks on every route already added to `router`.
    ///
    /// Call this after the routes are registered. When statsd is disabled the
    /// router is returned untouched and no request is ever reported.
    pub fn instrument<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        if !self.inner.config.enabled {
            tracing::info!(app = %self.inner.app_name, "statsd disabled, request handlers not instrumented");
            return router;
        }
        router.layer(axum::middleware::from_fn_with_state(
            self.clone(),
            track_requests,
        ))
    }

    /// Explicit per-call rate in (0, 1], otherwise the configured default.
    pub(crate) fn resolve_rate(&self, rate: Option<f64>) -> f64 {
        match rate {
            Some(r) if r > 0.0 && r <= 1.0 => r,
            _ => self.inner.config.rate,
        }
    }

    fn metric_name(&self, stat: &str) -> String {
        naming::app_metric(&self.inner.app_name, stat)
    }

    fn client(&self) -> &Arc<dyn MetricsBackend> {
        self.inner
            .backend
            .get_or_init(|| (self.inner.factory)(&self.inner.config))
    }
}

impl fmt::Debug for Statsd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statsd")
            .field("app_name", &self.inner.app_name)
            .field("config", &self.inner.config)
            .field("connected", &self.inner.backend.get().is_some())
            .finish()
    }
}

/// Scoped timer returned by [`Statsd::timer`].
pub struct ScopedTimer {
    statsd: Statsd,
    stat: String,
    rate: Option<f64>,
    started: Instant,
}

impl ScopedTimer {
    pub fn stat(&self) -> &str {
        &self.stat
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let delta_ms = self.started.elapsed().as_millis() as u64;
        self.statsd.timing(&self.stat, delta_ms, self.rate);
    }
}
