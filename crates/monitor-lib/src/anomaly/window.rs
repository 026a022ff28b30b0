//! Bounded rolling window of heart-rate samples
//!
//! A fixed-capacity FIFO over the most recent accepted samples, with the
//! summary statistics the detector needs computed on demand.

use std::collections::VecDeque;

/// Mean and population standard deviation of a window snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Arithmetic mean of the samples
    pub mean: f64,
    /// Population standard deviation (divides by `count`, not `count - 1`)
    pub std_dev: f64,
    /// Number of samples the statistics were computed over
    pub count: usize,
}

/// Fixed-capacity FIFO of samples; the oldest entry is evicted first
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// Create an empty window holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, returning the evicted one if the window overflowed
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.samples.push_back(value);
        if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Mean and population standard deviation, `None` when empty
    pub fn stats(&self) -> Option<WindowStats> {
        if self.samples.is_empty() {
            return None;
        }

        let count = self.samples.len();
        let mean = self.samples.iter().sum::<f64>() / count as f64;

        // Two-pass variance
        let variance = self
            .samples
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        Some(WindowStats {
            mean,
            std_dev: variance.sqrt(),
            count,
        })
    }
}
