//! Prometheus exposition of the gauge set.
//!
//! The sink is exposed through a custom collector that reads every
//! `(up, latency)` pair from one snapshot per scrape, next to the standard
//! process metrics.

use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use super::MetricsSink;

pub use prometheus::TEXT_FORMAT as PROMETHEUS_CONTENT_TYPE;

pub const UP_METRIC: &str = "website_up";
pub const LATENCY_METRIC: &str = "website_response_time_seconds";

const UP_HELP: &str = "Whether the website answered the last check (1) or not (0).";
const LATENCY_HELP: &str = "Response time of the last successful check in seconds, 0 when down.";
const LABELS: [&str; 2] = ["url", "owner_id"];

fn gauge_vecs() -> prometheus::Result<(GaugeVec, GaugeVec)> {
    let up = GaugeVec::new(Opts::new(UP_METRIC, UP_HELP), &LABELS)?;
    let latency = GaugeVec::new(Opts::new(LATENCY_METRIC, LATENCY_HELP), &LABELS)?;
    Ok((up, latency))
}

/// Collector building both gauge families from the same sink snapshot.
pub struct SinkCollector {
    sink: Arc<MetricsSink>,
    descs: Vec<Desc>,
}

impl SinkCollector {
    pub fn new(sink: Arc<MetricsSink>) -> prometheus::Result<Self> {
        let (up, latency) = gauge_vecs()?;
        let descs = up
            .desc()
            .into_iter()
            .chain(latency.desc())
            .cloned()
            .collect();

        Ok(Self { sink, descs })
    }
}

impl Collector for SinkCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let (up, latency) = match gauge_vecs() {
            Ok(vecs) => vecs,
            Err(e) => {
                tracing::error!("Failed to build gauge families: {}", e);
                return Vec::new();
            }
        };

        for (key, pair) in self.sink.entries() {
            let labels = [key.url_label.as_str(), key.owner_id.as_str()];
            up.with_label_values(&labels).set(f64::from(pair.up));
            latency.with_label_values(&labels).set(pair.latency_seconds);
        }

        let mut families = up.collect();
        families.extend(latency.collect());
        families
    }
}

/// Registry served on the scrape endpoint.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    /// Register the sink collector and, where supported, process metrics.
    pub fn new(sink: Arc<MetricsSink>) -> prometheus::Result<Self> {
        let registry = Registry::new();
        registry.register(Box::new(SinkCollector::new(sink)?))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self { registry })
    }

    /// Render every registered family in the text exposition format.
    ///
    /// Gauge families without series are left out; series are ordered by
    /// label value.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
