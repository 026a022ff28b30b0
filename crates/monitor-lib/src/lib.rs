//! Heart-rate monitoring library
//!
//! This crate provides the core functionality for:
//! - Windowed anomaly detection on heart-rate readings
//! - Telemetry feed ingestion
//! - The per-channel polling loop
//! - Health checks and observability

pub mod anomaly;
pub mod api;
pub mod feed;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;

pub use anomaly::{Classification, DetectorConfig, WindowedAnomalyDetector};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
