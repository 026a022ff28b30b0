//! Classification results produced by the detector

use serde::{Deserialize, Serialize};

/// Outcome of classifying one heart-rate sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Reading absent or zero
    NoData,
    /// Reading above the upper hard threshold (tachycardia)
    Critical,
    /// Reading below the lower hard threshold (bradycardia)
    Warning,
    /// Not enough history yet for statistics; the reading was recorded
    Calibrating,
    /// Reading deviates from the recent baseline beyond the z-score cutoff
    Anomaly { z_score: f64 },
    /// Reading is consistent with the recent baseline
    Normal,
}

/// Coarse severity used for log levels and alert routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl Classification {
    /// Stable snake_case name, used for log fields and metric labels
    pub fn label(&self) -> &'static str {
        match self {
            Classification::NoData => "no_data",
            Classification::Critical => "critical",
            Classification::Warning => "warning",
            Classification::Calibrating => "calibrating",
            Classification::Anomaly { .. } => "anomaly",
            Classification::Normal => "normal",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Classification::Critical => Severity::Critical,
            Classification::Warning | Classification::Anomaly { .. } => Severity::Warning,
            Classification::NoData | Classification::Calibrating | Classification::Normal => {
                Severity::Info
            }
        }
    }

    /// Whether the reading needs attention
    pub fn is_alert(&self) -> bool {
        self.severity() > Severity::Info
    }

    /// Z-score for statistical anomalies
    pub fn z_score(&self) -> Option<f64> {
        match self {
            Classification::Anomaly { z_score } => Some(*z_score),
            _ => None,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::NoData => write!(f, "NO_DATA"),
            Classification::Critical => write!(f, "CRITICAL: Tachycardia Detected (High HR)"),
            Classification::Warning => write!(f, "WARNING: Bradycardia Detected (Low HR)"),
            Classification::Calibrating => write!(f, "CALIBRATING: Gathering baseline data..."),
            Classification::Anomaly { z_score } => write!(
                f,
                "ANOMALY: Irregular spike detected! (Z-Score: {:.2})",
                z_score
            ),
            Classification::Normal => write!(f, "NORMAL: Heart rate is stable."),
        }
    }
}
