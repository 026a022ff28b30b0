//! Health check infrastructure for the heart-rate monitor
//!
//! Tracks whether the telemetry feed is reachable and whether the detector
//! has a usable baseline, for liveness and readiness probes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Operating with reduced usefulness (feed hiccup, detector calibrating)
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const FEED: &str = "feed";
    pub const DETECTOR: &str = "detector";
}

/// Number of consecutive feed failures after which the feed is unhealthy
const FEED_FAILURE_LIMIT: u32 = 5;

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    feed_failures: Arc<RwLock<u32>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            feed_failures: Arc::new(RwLock::new(0)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record a successful feed request
    pub async fn feed_succeeded(&self) {
        *self.feed_failures.write().await = 0;
        self.set_healthy(components::FEED).await;
    }

    /// Record a failed feed request
    ///
    /// The feed is degraded on the first failure and unhealthy once
    /// failures run `FEED_FAILURE_LIMIT` polls in a row.
    pub async fn feed_failed(&self, error: impl Into<String>) {
        let failures = {
            let mut failures = self.feed_failures.write().await;
            *failures += 1;
            *failures
        };

        let message = format!("{} ({} consecutive failures)", error.into(), failures);
        if failures >= FEED_FAILURE_LIMIT {
            self.set_unhealthy(components::FEED, message).await;
        } else {
            self.set_degraded(components::FEED, message).await;
        }
    }

    /// Reflect the detector's calibration progress
    pub async fn detector_progress(&self, samples: usize, min_samples: usize) {
        if samples >= min_samples {
            self.set_healthy(components::DETECTOR).await;
        } else {
            self.set_degraded(
                components::DETECTOR,
                format!("Calibrating: {}/{} samples", samples, min_samples),
            )
            .await;
        }
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Monitor not yet initialized".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            // Ready while calibrating; report how far along the baseline is
            let reason = health
                .components
                .get(components::DETECTOR)
                .filter(|detector| detector.status == ComponentStatus::Degraded)
                .and_then(|detector| detector.message.clone());
            ReadinessResponse {
                ready: true,
                reason,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_feed_failure_escalation() {
        let registry = HealthRegistry::new();
        registry.register(components::FEED).await;

        registry.feed_failed("connection refused").await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.components[components::FEED]
            .message
            .as_deref()
            .unwrap()
            .contains("1 consecutive"));

        for _ in 1..FEED_FAILURE_LIMIT {
            registry.feed_failed("connection refused").await;
        }
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);

        registry.feed_succeeded().await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        // Counter was reset by the success
        registry.feed_failed("timeout").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_detector_calibration_degrades() {
        let registry = HealthRegistry::new();
        registry.register(components::DETECTOR).await;

        registry.detector_progress(2, 5).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::DETECTOR].message.as_deref(),
            Some("Calibrating: 2/5 samples")
        );

        registry.detector_progress(5, 5).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_ready_while_calibrating() {
        let registry = HealthRegistry::new();
        registry.register(components::DETECTOR).await;
        registry.detector_progress(0, 5).await;
        registry.set_ready(true).await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Calibrating: 0/5 samples"));

        registry.detector_progress(5, 5).await;
        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert_eq!(readiness.reason, None);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::FEED).await;
        registry.set_ready(true).await;
        registry.set_unhealthy(components::FEED, "Channel not found").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
    }
}
