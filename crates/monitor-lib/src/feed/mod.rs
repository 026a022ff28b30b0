//! Telemetry feed ingestion
//!
//! Fetches the latest published heart-rate entry from a remote channel and
//! turns it into a numeric reading. Malformed values are rejected here and
//! never reach the detector.

mod thingspeak;

pub use thingspeak::{ThingSpeakClient, ThingSpeakConfig, DEFAULT_BASE_URL};

use crate::models::{FeedEntry, Reading};
use thiserror::Error;

pub use async_trait::async_trait;

/// Errors from fetching or interpreting feed data
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode feed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid feed URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid reading in entry {entry_id}: {raw:?}")]
    InvalidReading { entry_id: u64, raw: String },
}

/// Trait for heart-rate feed implementations
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the most recent entry, `None` if the channel has no data yet
    async fn latest(&self) -> Result<Option<FeedEntry>, FeedError>;

    /// Channel identifier, used in logs
    fn channel(&self) -> &str;
}

/// Parse the heart-rate field of an entry
///
/// An absent or blank field yields `Ok(None)`: the entry carries no reading
/// and is skipped without classification.
pub fn parse_reading(entry: &FeedEntry, field: &str) -> Result<Option<Reading>, FeedError> {
    let raw = match entry.field(field) {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };

    let bpm = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| FeedError::InvalidReading {
            entry_id: entry.entry_id,
            raw: raw.clone(),
        })?;

    Ok(Some(Reading {
        entry_id: entry.entry_id,
        timestamp: clean_timestamp(&entry.created_at),
        bpm,
    }))
}

/// Render an ISO-8601 UTC timestamp as `YYYY-MM-DD HH:MM:SS`
pub fn clean_timestamp(raw: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.replace('T', " ").replace('Z', ""),
    }
}
