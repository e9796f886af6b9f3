// src/metrics/registry.rs

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Samples retained per histogram series. Oldest evicted on overflow.
const HISTOGRAM_CAPACITY: usize = 1000;

/// One histogram sample.
#[derive(Debug, Clone, Copy)]
struct MetricEntry {
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
    value: f64,
}

/// In-process metrics store shared by the health monitor and the request path.
///
/// Counters accumulate, gauges hold the last-set value, histograms keep the
/// most recent [`HISTOGRAM_CAPACITY`] samples per series. All maps are keyed
/// by metric name and locked per entry, so writes to different names never
/// contend.
///
/// One registry is constructed per process and handed to every component that
/// reports into it; tests build their own instance instead of resetting a
/// shared one.
pub struct MetricsRegistry {
    counters: DashMap<String, f64>,
    gauges: DashMap<String, f64>,
    histograms: DashMap<String, VecDeque<MetricEntry>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            gauges: DashMap::new(),
            histograms: DashMap::new(),
        }
    }

    /// Add `by` to a counter, creating it at 0 first. Negative deltas are
    /// accepted and simply subtract; callers are expected not to use them.
    pub fn increment_counter(&self, name: &str, by: f64) {
        *self.counters.entry(name.to_string()).or_insert(0.0) += by;
    }

    pub fn increment(&self, name: &str) {
        self.increment_counter(name, 1.0);
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
    }

    /// Append a timestamped sample, evicting from the front once the series
    /// exceeds its capacity. Inserts happen one at a time, so at most one
    /// sample is dropped per call.
    pub fn record_histogram(&self, name: &str, value: f64) {
        let mut series = self
            .histograms
            .entry(name.to_string())
            .or_insert_with(|| VecDeque::with_capacity(HISTOGRAM_CAPACITY));
        series.push_back(MetricEntry {
            timestamp: Utc::now(),
            value,
        });
        while series.len() > HISTOGRAM_CAPACITY {
            series.pop_front();
        }
    }

    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0.0)
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).map(|v| *v)
    }

    /// Stats over the retained samples, or None for an empty/unknown series.
    /// p95 is nearest-rank: the value at sorted index floor(count * 0.95).
    pub fn histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        let series = self.histograms.get(name)?;
        if series.is_empty() {
            return None;
        }

        let mut values: Vec<f64> = series.iter().map(|e| e.value).collect();
        drop(series);
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = values.len();
        let sum: f64 = values.iter().sum();
        let p95_index = ((count as f64) * 0.95).floor() as usize;

        Some(HistogramStats {
            count,
            avg: sum / count as f64,
            min: values[0],
            max: values[count - 1],
            p95: values[p95_index.min(count - 1)],
        })
    }

    /// Point-in-time view of every metric, for the /metrics payload.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        let gauges = self
            .gauges
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        let histograms = self
            .histograms
            .iter()
            .map(|e| e.key().clone())
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|name| self.histogram_stats(&name).map(|stats| (name, stats)))
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            histograms,
        }
    }

    /// Drop every counter, gauge, and histogram series.
    pub fn reset(&self) {
        self.counters.clear();
        self.gauges.clear();
        self.histograms.clear();
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramStats>,
}
