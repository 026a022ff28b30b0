//! Heart-rate anomaly detection
//!
//! This module provides:
//! - Hard clinical thresholds (tachycardia / bradycardia)
//! - Z-score outlier detection over a bounded rolling window
//! - A closed classification result type

mod classification;
mod detector;
mod window;

pub use classification::{Classification, Severity};
pub use detector::{
    ConfigError, DetectorConfig, WindowedAnomalyDetector, DEFAULT_HIGH_THRESHOLD,
    DEFAULT_LOW_THRESHOLD, DEFAULT_MIN_SAMPLES, DEFAULT_WINDOW_SIZE, DEFAULT_Z_CUTOFF,
    MAX_WINDOW_SIZE,
};
pub use window::{RollingWindow, WindowStats};
