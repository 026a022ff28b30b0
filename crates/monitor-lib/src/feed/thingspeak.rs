//! ThingSpeak channel feed client

use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{async_trait, FeedError, FeedSource};
use crate::models::{ChannelFeed, FeedEntry};

/// Default public API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.thingspeak.com";

/// Configuration for the ThingSpeak client
#[derive(Debug, Clone)]
pub struct ThingSpeakConfig {
    /// API base URL
    pub base_url: String,
    /// Channel to read
    pub channel_id: String,
    /// Read API key; public channels need none
    pub read_api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ThingSpeakConfig {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            channel_id: channel_id.into(),
            read_api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the read API key
    pub fn with_read_api_key(mut self, key: impl Into<String>) -> Self {
        self.read_api_key = Some(key.into());
        self
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reads the latest entry of a ThingSpeak channel
pub struct ThingSpeakClient {
    client: Client,
    feed_url: Url,
    channel_id: String,
    read_api_key: Option<String>,
}

impl ThingSpeakClient {
    /// Create a new client
    pub fn new(config: ThingSpeakConfig) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        // Url::join drops the last path segment unless it ends with '/'
        let mut base = config.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let feed_url = Url::parse(&base)?
            .join(&format!("channels/{}/feeds.json", config.channel_id))?;

        Ok(Self {
            client,
            feed_url,
            channel_id: config.channel_id,
            read_api_key: config.read_api_key,
        })
    }

    /// Full URL of the feed endpoint, without query parameters
    pub fn feed_url(&self) -> &Url {
        &self.feed_url
    }
}

#[async_trait]
impl FeedSource for ThingSpeakClient {
    async fn latest(&self) -> Result<Option<FeedEntry>, FeedError> {
        let mut request = self
            .client
            .get(self.feed_url.clone())
            .query(&[("results", "1")]);
        if let Some(ref key) = self.read_api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status { status, body });
        }

        let body = response.text().await?;
        let feed: ChannelFeed = serde_json::from_str(&body)?;

        debug!(
            channel = %self.channel_id,
            entries = feed.feeds.len(),
            "Fetched channel feed"
        );

        // Only one result is requested; take the newest if the API sends more
        Ok(feed.feeds.into_iter().max_by_key(|entry| entry.entry_id))
    }

    fn channel(&self) -> &str {
        &self.channel_id
    }
}
