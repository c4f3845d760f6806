use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Error reading aggregates from a series with no samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesError {
    pub series: String,
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "metric series '{}' has no samples", self.series)
    }
}

impl std::error::Error for SeriesError {}

/// Rolling numeric history for one measured quantity.
///
/// A capacity of 0 means unbounded append-only retention. A non-zero
/// capacity turns the series into a fixed-size ring: once full, the oldest
/// sample is evicted on every append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSeries {
    name: String,
    values: VecDeque<f64>,
    capacity: usize,
}

impl MetricSeries {
    /// Create an unbounded append-only series
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: VecDeque::new(),
            capacity: 0,
        }
    }

    /// Create a ring series holding at most `capacity` samples
    ///
    /// A capacity of 0 falls back to unbounded retention.
    pub fn ring(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append a sample, evicting the oldest one first when the ring is full
    pub fn append(&mut self, value: f64) {
        if self.capacity > 0 && self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Most recent sample
    pub fn last(&self) -> Result<f64, SeriesError> {
        self.values.back().copied().ok_or_else(|| self.empty())
    }

    /// Arithmetic mean over current contents
    pub fn average(&self) -> Result<f64, SeriesError> {
        if self.values.is_empty() {
            return Err(self.empty());
        }
        let sum: f64 = self.values.iter().sum();
        Ok(sum / self.values.len() as f64)
    }

    /// Largest sample in the current contents
    pub fn max(&self) -> Result<f64, SeriesError> {
        self.values
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, v| match acc {
                Some(m) => Some(m.max(v)),
                None => Some(v),
            })
            .ok_or_else(|| self.empty())
    }

    /// Smallest sample in the current contents
    pub fn min(&self) -> Result<f64, SeriesError> {
        self.values
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, v| match acc {
                Some(m) => Some(m.min(v)),
                None => Some(v),
            })
            .ok_or_else(|| self.empty())
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// Drop all samples, keeping name and capacity
    pub fn reset(&mut self) {
        self.values.clear();
    }

    fn empty(&self) -> SeriesError {
        SeriesError {
            series: self.name.clone(),
        }
    }
}
