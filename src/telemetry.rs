use metrics::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Pipeline metrics. Handles are no-ops until a recorder is installed.
pub struct Metrics {
    pub capture_attempts: Counter,
    pub attempt_failures: Counter,
    pub captures_succeeded: Counter,
    pub captures_failed: Counter,
    pub batches_completed: Counter,
    pub capture_duration: Histogram,
    pub open_sessions: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            capture_attempts: register_counter!("capture_attempts_total"),
            attempt_failures: register_counter!("capture_attempt_failures_total"),
            captures_succeeded: register_counter!("captures_succeeded_total"),
            captures_failed: register_counter!("captures_failed_total"),
            batches_completed: register_counter!("capture_batches_completed_total"),
            capture_duration: register_histogram!("capture_duration_seconds"),
            open_sessions: register_gauge!("capture_open_sessions"),
        }
    }

    pub fn record_attempt(&self, success: bool) {
        self.capture_attempts.increment(1);
        if !success {
            self.attempt_failures.increment(1);
        }
    }

    pub fn record_capture(&self, duration: Duration, success: bool) {
        if success {
            self.captures_succeeded.increment(1);
        } else {
            self.captures_failed.increment(1);
        }

        self.capture_duration.record(duration.as_secs_f64());
    }

    pub fn record_batch(&self) {
        self.batches_completed.increment(1);
    }

    pub fn session_opened(&self) {
        self.open_sessions.increment(1.0);
    }

    pub fn session_closed(&self) {
        self.open_sessions.decrement(1.0);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from inside a tokio runtime and before [`Metrics::new`],
/// otherwise the handles stay bound to the no-op recorder.
pub fn install_prometheus_exporter(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Prometheus metrics available on http://{}/metrics", addr);
    Ok(())
}
