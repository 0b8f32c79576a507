//! In-memory gauge set populated by the check scheduler.
//!
//! Every monitored site owns one `(up, latency)` pair, keyed by its URL label
//! and owner. The pair lives behind a single lock so a scrape can never see
//! the status from one cycle next to the latency from another.
//!
//! ```text
//! Scheduler ──record()──▶ MetricsSink ◀──SinkCollector── MetricsRegistry ◀── GET /metrics
//! ```

mod exposition;

pub use exposition::*;

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use crate::probe::ProbeResult;

/// Identifies one monitored series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub url_label: String,
    pub owner_id: String,
}

impl SeriesKey {
    pub fn new(url_label: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            url_label: url_label.into(),
            owner_id: owner_id.into(),
        }
    }
}

/// Current values of the two gauges for one series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GaugePair {
    /// 1 when the last probe succeeded, 0 otherwise.
    pub up: u8,
    pub latency_seconds: f64,
}

/// Label-indexed gauges, safe for one writer and many scrapers.
#[derive(Debug, Default)]
pub struct MetricsSink {
    series: RwLock<BTreeMap<SeriesKey, GaugePair>>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the "is up" gauge for a series.
    pub fn set_up(&self, url_label: &str, owner_id: &str, up: bool) {
        let mut series = self.series.write().unwrap();
        series
            .entry(SeriesKey::new(url_label, owner_id))
            .or_default()
            .up = u8::from(up);
    }

    /// Set the latency gauge for a series.
    pub fn set_latency(&self, url_label: &str, owner_id: &str, seconds: f64) {
        let mut series = self.series.write().unwrap();
        series
            .entry(SeriesKey::new(url_label, owner_id))
            .or_default()
            .latency_seconds = seconds;
    }

    /// Write both gauges from one probe result in a single step.
    pub fn record(&self, result: &ProbeResult) {
        let pair = GaugePair {
            up: u8::from(result.is_up),
            latency_seconds: if result.is_up {
                result.latency_seconds
            } else {
                0.0
            },
        };

        let mut series = self.series.write().unwrap();
        series.insert(
            SeriesKey::new(result.url_label.as_str(), result.owner_id.as_str()),
            pair,
        );
    }

    /// Drop every series not present in `keep`. Returns how many were removed.
    pub fn retain(&self, keep: &HashSet<SeriesKey>) -> usize {
        let mut series = self.series.write().unwrap();
        let before = series.len();
        series.retain(|key, _| keep.contains(key));
        before - series.len()
    }

    /// Current values for one series, if it has ever been written.
    pub fn snapshot(&self, url_label: &str, owner_id: &str) -> Option<GaugePair> {
        let series = self.series.read().unwrap();
        series.get(&SeriesKey::new(url_label, owner_id)).copied()
    }

    /// Point-in-time copy of every series, in label order.
    pub fn entries(&self) -> Vec<(SeriesKey, GaugePair)> {
        let series = self.series.read().unwrap();
        series.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn series_count(&self) -> usize {
        self.series.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(url: &str, owner: &str, is_up: bool, latency: f64) -> ProbeResult {
        ProbeResult {
            target_id: 1,
            url_label: url.to_string(),
            owner_id: owner.to_string(),
            is_up,
            latency_seconds: latency,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_writes_pair() {
        let sink = MetricsSink::new();
        sink.record(&result("https://a.example", "alice", true, 0.05));
        assert_eq!(
            sink.snapshot("https://a.example", "alice"),
            Some(GaugePair { up: 1, latency_seconds: 0.05 })
        );

        // A failed probe never keeps an old latency next to up=0
        sink.record(&result("https://a.example", "alice", false, 0.7));
        assert_eq!(
            sink.snapshot("https://a.example", "alice"),
            Some(GaugePair { up: 0, latency_seconds: 0.0 })
        );
    }

    #[test]
    fn test_individual_setters() {
        let sink = MetricsSink::new();
        sink.set_up("https://a.example", "alice", true);
        assert_eq!(
            sink.snapshot("https://a.example", "alice"),
            Some(GaugePair { up: 1, latency_seconds: 0.0 })
        );
        sink.set_latency("https://a.example", "alice", 0.25);
        assert_eq!(
            sink.snapshot("https://a.example", "alice"),
            Some(GaugePair { up: 1, latency_seconds: 0.25 })
        );
    }

    #[test]
    fn test_same_url_different_owners() {
        let sink = MetricsSink::new();
        sink.record(&result("https://a.example", "alice", true, 0.1));
        sink.record(&result("https://a.example", "bob", false, 0.0));
        assert_eq!(sink.series_count(), 2);
        assert_eq!(sink.snapshot("https://a.example", "alice").unwrap().up, 1);
        assert_eq!(sink.snapshot("https://a.example", "bob").unwrap().up, 0);
    }

    #[test]
    fn test_retain_drops_removed() {
        let sink = MetricsSink::new();
        sink.record(&result("https://a.example", "alice", true, 0.1));
        sink.record(&result("https://gone.example", "alice", true, 0.1));

        let keep: HashSet<_> = [SeriesKey::new("https://a.example", "alice")].into();
        assert_eq!(sink.retain(&keep), 1);
        assert!(sink.snapshot("https://gone.example", "alice").is_none());
        assert!(sink.snapshot("https://a.example", "alice").is_some());
    }

    #[test]
    fn test_concurrent_readers_see_consistent_pairs() {
        use std::sync::Arc;

        let sink = Arc::new(MetricsSink::new());
        let writer = {
            let sink = sink.clone();
            std::thread::spawn(move || {
                for i in 0..2000 {
                    let up = i % 2 == 0;
                    sink.record(&result("https://a.example", "alice", up, 0.5));
                }
            })
        };

        for _ in 0..2000 {
            if let Some(pair) = sink.snapshot("https://a.example", "alice") {
                let consistent = (pair.up == 1 && pair.latency_seconds == 0.5)
                    || (pair.up == 0 && pair.latency_seconds == 0.0);
                assert!(consistent, "mixed pair observed: {:?}", pair);
            }
        }
        writer.join().unwrap();
    }
}
