//! Monitor configuration

use anyhow::{Context, Result};
use monitor_lib::anomaly::{
    DetectorConfig, DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD, DEFAULT_MIN_SAMPLES,
    DEFAULT_WINDOW_SIZE, DEFAULT_Z_CUTOFF,
};
use monitor_lib::feed::{ThingSpeakConfig, DEFAULT_BASE_URL};
use serde::Deserialize;
use std::time::Duration;

/// Monitor configuration, read from `MONITOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Telemetry channel to read
    #[serde(default = "default_channel_id")]
    pub channel_id: String,

    /// Read API key (never the write key)
    #[serde(default)]
    pub read_api_key: Option<String>,

    /// Feed API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Feed field holding the heart rate
    #[serde(default = "default_field")]
    pub field: String,

    /// Seconds between feed requests; match or exceed the sensor upload rate
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,

    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default = "default_z_cutoff")]
    pub z_cutoff: f64,
}

fn default_channel_id() -> String {
    "2594968".to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_field() -> String {
    "field1".to_string()
}

fn default_poll_interval() -> u64 {
    20
}

fn default_request_timeout() -> u64 {
    30
}

fn default_api_port() -> u16 {
    8080
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_high_threshold() -> f64 {
    DEFAULT_HIGH_THRESHOLD
}

fn default_low_threshold() -> f64 {
    DEFAULT_LOW_THRESHOLD
}

fn default_min_samples() -> usize {
    DEFAULT_MIN_SAMPLES
}

fn default_z_cutoff() -> f64 {
    DEFAULT_Z_CUTOFF
}

impl MonitorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MONITOR").try_parsing(true))
            .build()
            .context("Failed to read monitor configuration")?;

        let config: MonitorConfig = config
            .try_deserialize()
            .context("Invalid monitor configuration")?;

        config
            .detector_config()
            .validate()
            .context("Invalid detector configuration")?;

        Ok(config)
    }

    /// Detector parameters
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            window_size: self.window_size,
            high_threshold: self.high_threshold,
            low_threshold: self.low_threshold,
            min_samples: self.min_samples,
            z_cutoff: self.z_cutoff,
        }
    }

    /// Feed client parameters
    pub fn feed_config(&self) -> ThingSpeakConfig {
        let mut feed = ThingSpeakConfig::new(&self.channel_id)
            .with_base_url(&self.api_base_url)
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(ref key) = self.read_api_key {
            feed = feed.with_read_api_key(key);
        }
        feed
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
