//! Time series destinations.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use tracing::trace;

/// Receives plotted values.
///
/// Series are registered once at startup; `append` is then called once per
/// series per published frame.
pub trait TelemetrySink: Send + Sync {
    fn register_series(&self, name: &str);

    fn append(&self, name: &str, timestamp_s: f64, value: f64);
}

/// One point of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_s: f64,
    pub value: f64,
}

#[derive(Debug, Default)]
struct StoreInner {
    order: Vec<String>,
    series: HashMap<String, VecDeque<Sample>>,
}

/// In-memory [`TelemetrySink`] keeping the most recent samples of each series.
#[derive(Debug)]
pub struct SeriesStore {
    capacity: usize,
    inner: RwLock<StoreInner>,
}

impl SeriesStore {
    /// Store keeping at most `capacity` samples per series.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registered series, in registration order.
    pub fn series_names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    pub fn samples(&self, name: &str) -> Vec<Sample> {
        self.inner
            .read()
            .series
            .get(name)
            .map(|samples| samples.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, name: &str) -> Option<Sample> {
        self.inner
            .read()
            .series
            .get(name)
            .and_then(|samples| samples.back().copied())
    }

    pub fn len(&self, name: &str) -> usize {
        self.inner.read().series.get(name).map_or(0, VecDeque::len)
    }
}

impl TelemetrySink for SeriesStore {
    fn register_series(&self, name: &str) {
        let mut inner = self.inner.write();
        if inner.series.contains_key(name) {
            return;
        }
        inner.order.push(name.to_string());
        inner.series.insert(
            name.to_string(),
            VecDeque::with_capacity(self.capacity.min(1024)),
        );
    }

    fn append(&self, name: &str, timestamp_s: f64, value: f64) {
        let mut inner = self.inner.write();
        let Some(samples) = inner.series.get_mut(name) else {
            trace!(name, "Dropping sample for unregistered series");
            return;
        };
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(Sample { timestamp_s, value });
    }
}
