//! Channel monitoring
//!
//! Ties a feed source to a detector: one loop, one channel, one detector.

mod r#loop;

pub use r#loop::{MonitorLoop, MonitorLoopBuilder, PollConfig, PollOutcome};
