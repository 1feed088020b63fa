//! Running mean tracker for per-batch scalars (loss, accuracy, timing).

use serde::{Deserialize, Serialize};

/// Keeps the latest value plus a weighted running sum and average.
///
/// A fresh accumulator is created for every training or validation pass and
/// updated once per batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricAccumulator {
    value: f64,
    sum: f64,
    count: usize,
    average: f64,
}

/// Point-in-time copy of an accumulator, as carried by progress events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    pub value: f64,
    pub average: f64,
}

impl MetricAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records `value` observed over `weight` samples.
    ///
    /// # Panics
    ///
    /// Panics if the accumulated sample count would stay zero.
    pub fn update(&mut self, value: f64, weight: usize) {
        assert!(
            self.count + weight > 0,
            "metric update with zero total weight has no defined average"
        );
        self.value = value;
        self.sum += value * weight as f64;
        self.count += weight;
        self.average = self.sum / self.count as f64;
    }

    /// Shorthand for `update(value, 1)`.
    pub fn record(&mut self, value: f64) {
        self.update(value, 1);
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot { value: self.value, average: self.average }
    }
}
