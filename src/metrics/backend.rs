//! Statsd backend seam.
//!
//! [`MetricsBackend`] is the narrow interface the proxy client talks to. The
//! production implementation wraps a `cadence` client writing datagrams to a
//! non-blocking UDP socket; tests substitute a recording implementation.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::panic::RefUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use cadence::prelude::*;
use cadence::{MetricError, MetricResult, MetricSink, NopMetricSink, StatsdClient, UdpMetricSink};
use rand::Rng;
use tracing::{error, info, warn};

use crate::config::StatsdConfig;
use crate::utils::log_throttle;

const SEND_FAILURE_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Fire-and-forget sink for fully named metrics.
///
/// Implementations must never block the caller on the network and must never
/// surface transport failures.
pub trait MetricsBackend: Send + Sync {
    /// Adds `count` (possibly negative) to the counter `stat`, sampled at `rate`.
    fn incr(&self, stat: &str, count: i64, rate: f64);

    /// Records a `delta_ms` timer sample for `stat`, sampled at `rate`.
    fn timing(&self, stat: &str, delta_ms: u64, rate: f64);
}

/// Builds the backend for a configuration. Called at most once per
/// [`crate::Statsd`] handle.
pub type BackendFactory = Box<dyn Fn(&StatsdConfig) -> Arc<dyn MetricsBackend> + Send + Sync>;

/// Backend over a `cadence` statsd client.
pub struct CadenceBackend {
    client: StatsdClient,
}

impl CadenceBackend {
    /// Opens a non-blocking UDP socket towards `host:port`.
    ///
    /// The local socket is bound in the address family of the first resolved
    /// address, so IPv6-only hosts (or `localhost` resolving to `::1`) work.
    pub fn connect(config: &StatsdConfig) -> MetricResult<Self> {
        let target = resolve(&config.host, config.port)?;
        let local: SocketAddr = if target.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        let sink = UdpMetricSink::from(target, socket)?;
        Ok(Self::from_sink(config.client_prefix(), sink))
    }

    /// A backend that formats metrics and discards them.
    pub fn nop(config: &StatsdConfig) -> Self {
        Self::from_sink(config.client_prefix(), NopMetricSink)
    }

    /// A backend writing through any `cadence` sink.
    pub fn from_sink<T>(prefix: &str, sink: T) -> Self
    where
        T: MetricSink + Send + Sync + RefUnwindSafe + 'static,
    {
        Self {
            client: StatsdClient::from_sink(prefix, sink),
        }
    }

    /// Default factory: connects, or falls back to [`CadenceBackend::nop`]
    /// when the socket cannot be set up.
    pub fn factory() -> BackendFactory {
        Box::new(|config: &StatsdConfig| -> Arc<dyn MetricsBackend> {
            match CadenceBackend::connect(config) {
                Ok(backend) => {
                    info!(
                        host = %config.host,
                        port = config.port,
                        prefix = config.client_prefix(),
                        "statsd client initialized"
                    );
                    Arc::new(backend)
                }
                Err(e) => {
                    error!(
                        host = %config.host,
                        port = config.port,
                        error = %e,
                        "failed to initialize statsd client, metrics will be dropped"
                    );
                    Arc::new(CadenceBackend::nop(config))
                }
            }
        })
    }
}

impl MetricsBackend for CadenceBackend {
    fn incr(&self, stat: &str, count: i64, rate: f64) {
        if !sampled(rate) {
            return;
        }
        let mut builder = self.client.count_with_tags(stat, count);
        if rate < 1.0 {
            builder = builder.with_sampling_rate(rate);
        }
        report(stat, builder.try_send().map(|_| ()));
    }

    fn timing(&self, stat: &str, delta_ms: u64, rate: f64) {
        if !sampled(rate) {
            return;
        }
        let mut builder = self.client.time_with_tags(stat, delta_ms);
        if rate < 1.0 {
            builder = builder.with_sampling_rate(rate);
        }
        report(stat, builder.try_send().map(|_| ()));
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("statsd host {host} resolved to no address"),
        )
    })
}

/// Bernoulli draw deciding whether a sample at `rate` goes on the wire.
pub(crate) fn sampled(rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    rand::thread_rng().gen::<f64>() < rate
}

fn report(stat: &str, result: Result<(), MetricError>) {
    if let Err(e) = result {
        if let Some(suppressed) = log_throttle::should_emit("statsd.send", SEND_FAILURE_LOG_INTERVAL)
        {
            warn!(stat, error = %e, suppressed, "failed to send statsd metric");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_rate_always_samples() {
        assert!((0..1000).all(|_| sampled(1.0)));
    }

    #[test]
    fn zero_rate_never_samples() {
        assert!((0..1000).all(|_| !sampled(0.0)));
    }

    #[test]
    fn nop_backend_swallows_everything() {
        let backend = CadenceBackend::nop(&StatsdConfig::default());
        backend.incr("myapp.counter", 3, 1.0);
        backend.incr("myapp.counter", -3, 0.5);
        backend.timing("myapp.timer", 12, 1.0);
    }

    struct FailingSink;

    impl MetricSink for FailingSink {
        fn emit(&self, _metric: &str) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "statsd is down"))
        }
    }

    fn receive(listener: &UdpSocket) -> String {
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = [0u8; 512];
        let (len, _) = listener.recv_from(&mut buf).expect("datagram should arrive");
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    #[test]
    fn sends_to_ipv4_host() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = StatsdConfig {
            host: "127.0.0.1".into(),
            port: listener.local_addr().unwrap().port(),
            ..StatsdConfig::default()
        };

        let backend = CadenceBackend::connect(&config).expect("udp sink should build");
        backend.incr("myapp.counter", 1, 1.0);

        assert_eq!(receive(&listener), "myapp.counter:1|c");
    }

    #[test]
    fn sends_to_ipv6_host() {
        let listener = UdpSocket::bind("[::1]:0").unwrap();
        let config = StatsdConfig {
            host: "::1".into(),
            port: listener.local_addr().unwrap().port(),
            prefix: Some("myprefix".into()),
            ..StatsdConfig::default()
        };

        let backend = CadenceBackend::connect(&config).expect("udp sink should build");
        backend.timing("myapp.render", 7, 1.0);

        assert_eq!(receive(&listener), "myprefix.myapp.render:7|ms");
    }

    #[test]
    fn transport_failures_are_swallowed_and_throttled() {
        let backend = CadenceBackend::from_sink("", FailingSink);

        backend.incr("myapp.counter", 1, 1.0);
        backend.timing("myapp.render", 5, 1.0);

        // the first failure opened the log window; later ones are suppressed
        assert_eq!(
            log_throttle::should_emit("statsd.send", SEND_FAILURE_LOG_INTERVAL),
            None
        );
    }
}
