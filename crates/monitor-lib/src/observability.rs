//! Observability infrastructure for the heart-rate monitor
//!
//! Provides:
//! - Prometheus metrics (readings by classification, feed errors, window fill)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::anomaly::{Classification, Severity};
use crate::models::ClassifiedReading;

/// Histogram buckets for feed request latency (in seconds)
const FETCH_LATENCY_BUCKETS: &[f64] = &[
    0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    readings_total: IntCounterVec,
    fetch_errors: IntCounter,
    invalid_readings: IntCounter,
    fetch_latency_seconds: Histogram,
    window_size: IntGauge,
    last_bpm: Gauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            readings_total: register_int_counter_vec!(
                "hr_monitor_readings_total",
                "Heart-rate readings classified, by classification",
                &["classification"]
            )
            .expect("Failed to register readings_total"),

            fetch_errors: register_int_counter!(
                "hr_monitor_fetch_errors_total",
                "Total number of failed feed requests"
            )
            .expect("Failed to register fetch_errors"),

            invalid_readings: register_int_counter!(
                "hr_monitor_invalid_readings_total",
                "Total number of feed entries with an unparsable reading"
            )
            .expect("Failed to register invalid_readings"),

            fetch_latency_seconds: register_histogram!(
                "hr_monitor_fetch_latency_seconds",
                "Time spent fetching the latest feed entry",
                FETCH_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            window_size: register_int_gauge!(
                "hr_monitor_window_size",
                "Number of samples in the detector's rolling window"
            )
            .expect("Failed to register window_size"),

            last_bpm: register_gauge!(
                "hr_monitor_last_bpm",
                "Most recent heart-rate reading"
            )
            .expect("Failed to register last_bpm"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a classified reading
    pub fn record_classification(
        &self,
        bpm: f64,
        classification: &Classification,
        window_len: usize,
    ) {
        let inner = self.inner();
        inner
            .readings_total
            .with_label_values(&[classification.label()])
            .inc();
        inner.last_bpm.set(bpm);
        inner.window_size.set(window_len as i64);
    }

    /// Record a feed request latency observation
    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
    }

    /// Increment feed errors counter
    pub fn inc_fetch_errors(&self) {
        self.inner().fetch_errors.inc();
    }

    /// Increment invalid readings counter
    pub fn inc_invalid_readings(&self) {
        self.inner().invalid_readings.inc();
    }

    /// Readings recorded under a classification label
    pub fn readings_for(&self, label: &str) -> u64 {
        self.inner().readings_total.with_label_values(&[label]).get()
    }
}

/// Structured logger for monitor events
#[derive(Clone)]
pub struct StructuredLogger {
    channel: String,
}

impl StructuredLogger {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    /// Log a classified reading; alerts go out at warn level
    pub fn log_reading(&self, classified: &ClassifiedReading) {
        let reading = &classified.reading;
        let classification = &classified.classification;
        let severity = classification.severity();

        if severity > Severity::Info {
            warn!(
                event = "reading_classified",
                channel = %self.channel,
                entry_id = reading.entry_id,
                timestamp = %reading.timestamp,
                bpm = reading.bpm,
                classification = classification.label(),
                severity = %severity,
                z_score = ?classification.z_score(),
                window_samples = classified.history_len,
                "[{}] BPM: {} | Status: {}",
                reading.timestamp,
                reading.bpm,
                classification
            );
        } else {
            info!(
                event = "reading_classified",
                channel = %self.channel,
                entry_id = reading.entry_id,
                timestamp = %reading.timestamp,
                bpm = reading.bpm,
                classification = classification.label(),
                severity = %severity,
                window_samples = classified.history_len,
                "[{}] BPM: {} | Status: {}",
                reading.timestamp,
                reading.bpm,
                classification
            );
        }
    }

    /// Log an entry whose reading could not be parsed
    pub fn log_invalid_reading(&self, entry_id: u64, raw: &str) {
        warn!(
            event = "invalid_reading",
            channel = %self.channel,
            entry_id = entry_id,
            raw = %raw,
            "Invalid data format received"
        );
    }

    /// Log a failed feed request
    pub fn log_fetch_error(&self, error: &str) {
        warn!(
            event = "fetch_failed",
            channel = %self.channel,
            error = %error,
            "Network error while fetching feed"
        );
    }

    /// Log an empty channel
    pub fn log_waiting(&self) {
        info!(
            event = "waiting_for_data",
            channel = %self.channel,
            "Waiting for data stream"
        );
    }

    /// Log monitor startup
    pub fn log_startup(&self, version: &str, window_size: usize) {
        info!(
            event = "monitor_started",
            channel = %self.channel,
            monitor_version = %version,
            window_size = window_size,
            "Heart rate monitor started"
        );
    }

    /// Log monitor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            channel = %self.channel,
            reason = %reason,
            "Heart rate monitor shutting down"
        );
    }
}
