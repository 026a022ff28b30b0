//! Feed polling loop
//!
//! Periodically fetches the latest channel entry, skips entries that were
//! already processed, and classifies each new reading.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::anomaly::{DetectorConfig, WindowedAnomalyDetector};
use crate::feed::{parse_reading, FeedError, FeedSource};
use crate::health::HealthRegistry;
use crate::models::ClassifiedReading;
use crate::observability::{MonitorMetrics, StructuredLogger};

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time between feed requests (default: 20 seconds)
    pub interval: Duration,
    /// Feed field holding the heart rate (default: `field1`)
    pub field: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            field: "field1".to_string(),
        }
    }
}

/// What a single poll did
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Channel has no entries yet
    Waiting,
    /// Latest entry was already processed
    Duplicate { entry_id: u64 },
    /// Latest entry carries no heart-rate value
    Skipped { entry_id: u64 },
    /// Latest entry's value could not be parsed
    Invalid { entry_id: u64 },
    /// Feed request failed
    FetchFailed,
    /// New reading classified
    Classified(ClassifiedReading),
}

/// Polls one channel and feeds its readings through one detector
pub struct MonitorLoop {
    source: Arc<dyn FeedSource>,
    detector: WindowedAnomalyDetector,
    config: PollConfig,
    /// Entry id of the last successfully processed reading
    last_entry_id: Option<u64>,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl MonitorLoop {
    pub fn new(
        source: Arc<dyn FeedSource>,
        detector: WindowedAnomalyDetector,
        config: PollConfig,
        health: HealthRegistry,
    ) -> Self {
        let logger = StructuredLogger::new(source.channel());
        Self {
            source,
            detector,
            config,
            last_entry_id: None,
            metrics: MonitorMetrics::new(),
            logger,
            health,
        }
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            channel = %self.source.channel(),
            interval_secs = self.config.interval.as_secs(),
            "Starting feed polling loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.poll_once().await;
                    debug!(outcome = ?outcome, "Poll complete");
                }
                _ = shutdown.recv() => {
                    info!("Shutting down feed polling loop");
                    break;
                }
            }
        }
    }

    /// Fetch the latest entry and classify it if it is new
    ///
    /// Detector health is refreshed whatever the outcome, so an empty or
    /// stalled channel still shows as calibrating.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let outcome = self.poll_feed().await;
        self.health
            .detector_progress(
                self.detector.history_len(),
                self.detector.config().min_samples,
            )
            .await;
        outcome
    }

    async fn poll_feed(&mut self) -> PollOutcome {
        let start = Instant::now();
        let fetched = self.source.latest().await;
        self.metrics
            .observe_fetch_latency(start.elapsed().as_secs_f64());

        let entry = match fetched {
            Ok(Some(entry)) => {
                self.health.feed_succeeded().await;
                entry
            }
            Ok(None) => {
                self.health.feed_succeeded().await;
                self.logger.log_waiting();
                return PollOutcome::Waiting;
            }
            Err(e) => {
                self.metrics.inc_fetch_errors();
                self.logger.log_fetch_error(&e.to_string());
                self.health.feed_failed(e.to_string()).await;
                return PollOutcome::FetchFailed;
            }
        };

        if self.last_entry_id == Some(entry.entry_id) {
            return PollOutcome::Duplicate {
                entry_id: entry.entry_id,
            };
        }

        // Skipped and invalid entries are not recorded as seen, so they are
        // reconsidered on the next poll
        let reading = match parse_reading(&entry, &self.config.field) {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                return PollOutcome::Skipped {
                    entry_id: entry.entry_id,
                }
            }
            Err(FeedError::InvalidReading { entry_id, raw }) => {
                self.metrics.inc_invalid_readings();
                self.logger.log_invalid_reading(entry_id, &raw);
                return PollOutcome::Invalid { entry_id };
            }
            Err(e) => {
                self.logger.log_fetch_error(&e.to_string());
                return PollOutcome::Invalid {
                    entry_id: entry.entry_id,
                };
            }
        };

        let classification = self.detector.classify(Some(reading.bpm));
        let classified = ClassifiedReading {
            reading,
            classification,
            history_len: self.detector.history_len(),
        };

        self.last_entry_id = Some(classified.reading.entry_id);
        self.metrics.record_classification(
            classified.reading.bpm,
            &classified.classification,
            classified.history_len,
        );
        self.logger.log_reading(&classified);

        PollOutcome::Classified(classified)
    }

    pub fn detector(&self) -> &WindowedAnomalyDetector {
        &self.detector
    }

    pub fn last_entry_id(&self) -> Option<u64> {
        self.last_entry_id
    }
}

/// Builder for creating the polling loop
pub struct MonitorLoopBuilder {
    source: Option<Arc<dyn FeedSource>>,
    detector_config: DetectorConfig,
    health: Option<HealthRegistry>,
    config: PollConfig,
}

impl MonitorLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            detector_config: DetectorConfig::default(),
            health: None,
            config: PollConfig::default(),
        }
    }

    /// Set the feed source
    pub fn source(mut self, source: Arc<dyn FeedSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the detector configuration
    pub fn detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector_config = config;
        self
    }

    /// Share a health registry with the API server
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the polling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the feed field holding the heart rate
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.config.field = field.into();
        self
    }

    /// Build the polling loop
    pub fn build(self) -> Result<MonitorLoop> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Feed source is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Polling interval must be positive");
        }
        let detector = WindowedAnomalyDetector::new(self.detector_config)?;

        Ok(MonitorLoop::new(
            source,
            detector,
            self.config,
            self.health.unwrap_or_default(),
        ))
    }
}

impl Default for MonitorLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::Classification;
    use crate::feed::async_trait;
    use crate::health::{components, ComponentStatus};
    use crate::models::FeedEntry;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Scripted feed for testing; repeats the last response once exhausted
    struct MockFeed {
        responses: Mutex<VecDeque<Result<Option<FeedEntry>, FeedError>>>,
    }

    impl MockFeed {
        fn new(responses: Vec<Result<Option<FeedEntry>, FeedError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl FeedSource for MockFeed {
        async fn latest(&self) -> Result<Option<FeedEntry>, FeedError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        fn channel(&self) -> &str {
            "test-channel"
        }
    }

    fn entry(entry_id: u64, field1: Option<&str>) -> Result<Option<FeedEntry>, FeedError> {
        let mut fields = HashMap::new();
        if let Some(v) = field1 {
            fields.insert("field1".to_string(), serde_json::Value::from(v));
        }
        Ok(Some(FeedEntry {
            entry_id,
            created_at: "2024-01-01T10:00:00Z".to_string(),
            fields,
        }))
    }

    fn monitor_for(feed: Arc<MockFeed>) -> MonitorLoop {
        MonitorLoopBuilder::new().source(feed).build().unwrap()
    }

    #[test]
    fn test_poll_config_default() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(20));
        assert_eq!(config.field, "field1");
    }

    #[test]
    fn test_builder_requires_source() {
        assert!(MonitorLoopBuilder::new().build().is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_detector_config() {
        let result = MonitorLoopBuilder::new()
            .source(MockFeed::new(vec![]))
            .detector_config(DetectorConfig::default().with_window_size(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = MonitorLoopBuilder::new()
            .source(MockFeed::new(vec![]))
            .interval(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_waiting_for_data() {
        let mut monitor = monitor_for(MockFeed::new(vec![Ok(None)]));
        assert_eq!(monitor.poll_once().await, PollOutcome::Waiting);
        assert_eq!(monitor.last_entry_id(), None);
    }

    #[tokio::test]
    async fn test_empty_feed_reports_calibrating() {
        let health = HealthRegistry::new();
        health.register(components::FEED).await;
        health.register(components::DETECTOR).await;

        let mut monitor = MonitorLoopBuilder::new()
            .source(MockFeed::new(vec![Ok(None), entry(4, Some("abc"))]))
            .health(health.clone())
            .build()
            .unwrap();

        assert_eq!(monitor.poll_once().await, PollOutcome::Waiting);
        let snapshot = health.health().await;
        let detector = &snapshot.components[components::DETECTOR];
        assert_eq!(detector.status, ComponentStatus::Degraded);
        assert_eq!(detector.message.as_deref(), Some("Calibrating: 0/5 samples"));

        assert_eq!(
            monitor.poll_once().await,
            PollOutcome::Invalid { entry_id: 4 }
        );
        let status = health.health().await.components[components::DETECTOR].status;
        assert_eq!(status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_duplicate_entry_not_reclassified() {
        let mut monitor = monitor_for(MockFeed::new(vec![
            entry(10, Some("72")),
            entry(10, Some("72")),
            entry(11, Some("74")),
        ]));

        match monitor.poll_once().await {
            PollOutcome::Classified(c) => {
                assert_eq!(c.reading.entry_id, 10);
                assert_eq!(c.classification, Classification::Calibrating);
                assert_eq!(c.history_len, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(
            monitor.poll_once().await,
            PollOutcome::Duplicate { entry_id: 10 }
        );
        assert_eq!(monitor.detector().history_len(), 1);

        assert!(matches!(
            monitor.poll_once().await,
            PollOutcome::Classified(_)
        ));
        assert_eq!(monitor.detector().history_len(), 2);
        assert_eq!(monitor.last_entry_id(), Some(11));
    }

    #[tokio::test]
    async fn test_invalid_reading_not_recorded() {
        let mut monitor = monitor_for(MockFeed::new(vec![
            entry(5, Some("abc")),
            entry(5, Some("abc")),
        ]));

        assert_eq!(
            monitor.poll_once().await,
            PollOutcome::Invalid { entry_id: 5 }
        );
        // Not marked as seen: reported again on the next poll
        assert_eq!(
            monitor.poll_once().await,
            PollOutcome::Invalid { entry_id: 5 }
        );
        assert_eq!(monitor.last_entry_id(), None);
        assert_eq!(monitor.detector().history_len(), 0);
    }

    #[tokio::test]
    async fn test_missing_field_skipped() {
        let mut monitor = monitor_for(MockFeed::new(vec![entry(3, None), entry(3, Some(""))]));

        assert_eq!(
            monitor.poll_once().await,
            PollOutcome::Skipped { entry_id: 3 }
        );
        assert_eq!(
            monitor.poll_once().await,
            PollOutcome::Skipped { entry_id: 3 }
        );
        assert_eq!(monitor.last_entry_id(), None);
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_feed() {
        let health = HealthRegistry::new();
        health.register(components::FEED).await;

        let feed = MockFeed::new(vec![
            Err(FeedError::Status {
                status: 500,
                body: "oops".to_string(),
            }),
            entry(1, Some("70")),
        ]);
        let mut monitor = MonitorLoopBuilder::new()
            .source(feed)
            .health(health.clone())
            .build()
            .unwrap();

        assert_eq!(monitor.poll_once().await, PollOutcome::FetchFailed);
        assert_eq!(health.health().await.status, ComponentStatus::Degraded);

        assert!(matches!(
            monitor.poll_once().await,
            PollOutcome::Classified(_)
        ));
        let status = health.health().await.components[components::FEED].status;
        assert_eq!(status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_threshold_alert_recorded_as_seen() {
        let mut monitor = monitor_for(MockFeed::new(vec![
            entry(20, Some("130")),
            entry(20, Some("130")),
        ]));

        match monitor.poll_once().await {
            PollOutcome::Classified(c) => {
                assert_eq!(
                    c.classification,
                    Classification::Critical
                );
                assert_eq!(c.history_len, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            monitor.poll_once().await,
            PollOutcome::Duplicate { entry_id: 20 }
        );
    }

    #[tokio::test]
    async fn test_full_stream_detects_spike() {
        let readings = ["60", "62", "61", "63", "60", "95"];
        let responses = readings
            .iter()
            .enumerate()
            .map(|(i, v)| entry(i as u64 + 1, Some(*v)))
            .collect();

        let health = HealthRegistry::new();
        let mut monitor = MonitorLoopBuilder::new()
            .source(MockFeed::new(responses))
            .health(health.clone())
            .build()
            .unwrap();

        let mut last = None;
        for _ in 0..readings.len() {
            last = Some(monitor.poll_once().await);
        }

        match last {
            Some(PollOutcome::Classified(c)) => {
                let z = c.classification.z_score().unwrap();
                assert!((z - 28.983).abs() < 1e-3);
                assert_eq!(c.history_len, 6);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let detector = health.health().await.components[components::DETECTOR].status;
        assert_eq!(detector, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let monitor = MonitorLoopBuilder::new()
            .source(MockFeed::new(vec![entry(1, Some("70"))]))
            .interval(Duration::from_millis(10))
            .build()
            .unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(monitor.run(rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
