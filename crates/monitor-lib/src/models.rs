//! Core data models for the heart-rate monitor

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::anomaly::Classification;

/// Channel feed response (`/channels/{id}/feeds.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelFeed {
    #[serde(default)]
    pub channel: Option<ChannelInfo>,
    #[serde(default)]
    pub feeds: Vec<FeedEntry>,
}

/// Channel metadata returned alongside the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_entry_id: Option<u64>,
}

/// One published record of the channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub entry_id: u64,
    pub created_at: String,
    /// `field1`..`field8`; values are strings or null
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl FeedEntry {
    /// Raw text of a field, `None` if absent or null
    pub fn field(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A feed entry whose heart-rate field parsed as a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub entry_id: u64,
    pub timestamp: String,
    pub bpm: f64,
}

/// A reading together with its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReading {
    pub reading: Reading,
    pub classification: Classification,
    /// Detector history length after the reading was classified
    pub history_len: usize,
}
