//! Windowed heart-rate anomaly detection
//!
//! Classifies one sample at a time against hard clinical thresholds and,
//! once enough history exists, against the z-score of the recent window.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{Classification, RollingWindow, WindowStats};

/// Default history capacity
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Default upper hard threshold (BPM)
pub const DEFAULT_HIGH_THRESHOLD: f64 = 100.0;

/// Default lower hard threshold (BPM)
pub const DEFAULT_LOW_THRESHOLD: f64 = 50.0;

/// Largest accepted history capacity
pub const MAX_WINDOW_SIZE: usize = 10_000;

/// Minimum samples required before z-scores are computed
pub const DEFAULT_MIN_SAMPLES: usize = 5;

/// Default anomaly sensitivity in standard deviations
pub const DEFAULT_Z_CUTOFF: f64 = 2.0;

/// Detector tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// History capacity
    pub window_size: usize,
    /// Hard upper alert bound; readings above it are critical
    pub high_threshold: f64,
    /// Hard lower alert bound; readings below it are warnings
    pub low_threshold: f64,
    /// Calibration floor
    pub min_samples: usize,
    /// Absolute z-score a reading must exceed to be an anomaly
    pub z_cutoff: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
            z_cutoff: DEFAULT_Z_CUTOFF,
        }
    }
}

/// Rejected detector configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("window_size must be positive")]
    ZeroWindow,

    #[error("window_size ({0}) exceeds the maximum of {MAX_WINDOW_SIZE}")]
    WindowTooLarge(usize),

    #[error("min_samples must be positive")]
    ZeroMinSamples,

    #[error("min_samples ({min_samples}) exceeds window_size ({window_size})")]
    MinSamplesExceedsWindow {
        min_samples: usize,
        window_size: usize,
    },

    #[error("thresholds must be finite, got low={low} high={high}")]
    NonFiniteThreshold { low: f64, high: f64 },

    #[error("low_threshold ({low}) is above high_threshold ({high})")]
    InvertedThresholds { low: f64, high: f64 },

    #[error("z_cutoff must be finite and positive, got {0}")]
    InvalidZCutoff(f64),
}

impl DetectorConfig {
    /// Set the history capacity
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Set both hard thresholds
    pub fn with_thresholds(mut self, low: f64, high: f64) -> Self {
        self.low_threshold = low;
        self.high_threshold = high;
        self
    }

    /// Set the calibration floor
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Set the anomaly z-score cutoff
    pub fn with_z_cutoff(mut self, z_cutoff: f64) -> Self {
        self.z_cutoff = z_cutoff;
        self
    }

    /// Check the parameters are mutually consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::WindowTooLarge(self.window_size));
        }
        if self.min_samples == 0 {
            return Err(ConfigError::ZeroMinSamples);
        }
        // A floor above capacity could never be reached
        if self.min_samples > self.window_size {
            return Err(ConfigError::MinSamplesExceedsWindow {
                min_samples: self.min_samples,
                window_size: self.window_size,
            });
        }
        if !self.low_threshold.is_finite() || !self.high_threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold {
                low: self.low_threshold,
                high: self.high_threshold,
            });
        }
        if self.low_threshold > self.high_threshold {
            return Err(ConfigError::InvertedThresholds {
                low: self.low_threshold,
                high: self.high_threshold,
            });
        }
        if !self.z_cutoff.is_finite() || self.z_cutoff <= 0.0 {
            return Err(ConfigError::InvalidZCutoff(self.z_cutoff));
        }
        Ok(())
    }
}

/// Streaming classifier over a bounded window of recent readings
///
/// One instance per monitored channel. `classify` takes `&mut self`, so a
/// detector is never updated from two call paths at once.
#[derive(Debug, Clone)]
pub struct WindowedAnomalyDetector {
    config: DetectorConfig,
    history: RollingWindow,
}

impl WindowedAnomalyDetector {
    /// Create a detector after validating its configuration
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            history: RollingWindow::new(config.window_size),
            config,
        })
    }

    /// Classify one reading
    ///
    /// Evaluation order:
    /// 1. `None`, zero, or NaN is `NoData`.
    /// 2. Hard thresholds on the raw value, regardless of history.
    /// 3. Below the calibration floor the reading is recorded and the
    ///    result is `Calibrating`.
    /// 4. Otherwise the z-score uses the mean and population standard
    ///    deviation of the history *before* this reading is appended.
    ///
    /// History is only touched in steps 3 and 4.
    pub fn classify(&mut self, current_bpm: Option<f64>) -> Classification {
        let bpm = match current_bpm {
            Some(v) if v != 0.0 && !v.is_nan() => v,
            _ => return Classification::NoData,
        };

        if bpm > self.config.high_threshold {
            return Classification::Critical;
        }
        if bpm < self.config.low_threshold {
            return Classification::Warning;
        }

        if self.history.len() < self.config.min_samples {
            self.history.push(bpm);
            debug!(
                bpm = bpm,
                samples = self.history.len(),
                min_samples = self.config.min_samples,
                "Calibrating detector baseline"
            );
            return Classification::Calibrating;
        }

        let baseline = self.history.stats();
        self.history.push(bpm);

        match baseline {
            Some(WindowStats { mean, std_dev, .. }) if std_dev > 0.0 => {
                let z_score = (bpm - mean) / std_dev;
                debug!(
                    bpm = bpm,
                    mean = mean,
                    std_dev = std_dev,
                    z_score = z_score,
                    "Scored reading against baseline"
                );
                if z_score.abs() > self.config.z_cutoff {
                    Classification::Anomaly { z_score }
                } else {
                    Classification::Normal
                }
            }
            // Flat baseline: no spread to measure against
            _ => Classification::Normal,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Number of samples currently in the window
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Samples in the window, oldest first
    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter()
    }

    /// Whether enough samples exist for statistical scoring
    pub fn is_calibrated(&self) -> bool {
        self.history.len() >= self.config.min_samples
    }

    /// Forget all history and return to calibration
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for WindowedAnomalyDetector {
    fn default() -> Self {
        Self {
            history: RollingWindow::new(DEFAULT_WINDOW_SIZE),
            config: DetectorConfig::default(),
        }
    }
}
