use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request};
use request_statsd::config::{ConfigV1, LoggingConfig, StatsdConfig};
use request_statsd::metrics::{MetricsBackend, Statsd};
use request_statsd::routes::create_router;
use request_statsd::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Incr { stat: String, count: i64, rate: f64 },
    Timing { stat: String, delta_ms: u64, rate: f64 },
}

impl Call {
    pub fn stat(&self) -> &str {
        match self {
            Call::Incr { stat, .. } | Call::Timing { stat, .. } => stat,
        }
    }
}

/// Backend recording every emission instead of sending it.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    builds: AtomicUsize,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("recorder poisoned").clone()
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl MetricsBackend for RecordingBackend {
    fn incr(&self, stat: &str, count: i64, rate: f64) {
        self.calls.lock().expect("recorder poisoned").push(Call::Incr {
            stat: stat.to_string(),
            count,
            rate,
        });
    }

    fn timing(&self, stat: &str, delta_ms: u64, rate: f64) {
        self.calls.lock().expect("recorder poisoned").push(Call::Timing {
            stat: stat.to_string(),
            delta_ms,
            rate,
        });
    }
}

pub fn recording_statsd(config: StatsdConfig) -> (Statsd, Arc<RecordingBackend>) {
    let recorder = Arc::new(RecordingBackend::default());
    let backend = recorder.clone();
    let statsd = Statsd::with_backend_factory(
        "myapp",
        config,
        Box::new(move |_: &StatsdConfig| -> Arc<dyn MetricsBackend> {
            backend.builds.fetch_add(1, Ordering::SeqCst);
            backend.clone()
        }),
    )
    .expect("valid statsd config");
    (statsd, recorder)
}

/// The demo application wired to a recording backend.
pub fn build_app(statsd_config: StatsdConfig) -> (Router, Arc<RecordingBackend>) {
    let (statsd, recorder) = recording_statsd(statsd_config.clone());
    let config = Arc::new(ConfigV1 {
        app_name: "myapp".into(),
        bind_address: "127.0.0.1:0".into(),
        logging: LoggingConfig::default(),
        statsd: statsd_config,
    });

    let state = AppState { config, statsd };
    (create_router(state), recorder)
}

pub fn build_request(path: &str) -> Request<Body> {
    build_request_with_method(path, Method::GET)
}

pub fn build_request_with_method(path: &str, method: Method) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}
