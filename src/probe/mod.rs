//! Probe module for website liveness checks.
//!
//! A probe makes one bounded-time request against a single URL and reports
//! whether the site answered successfully, plus how long it took.

mod http;

pub use http::*;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status code {0}")]
    Status(u16),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A liveness check against a single URL.
///
/// Implementations must bound their own running time and never retry;
/// a failure is simply picked up again on the next cycle.
pub trait Probe: Send + Sync + 'static {
    /// Check `url` once, returning the elapsed time on success.
    fn probe(&self, url: &str) -> impl Future<Output = Result<Duration, ProbeError>> + Send;
}

/// Binary outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub is_up: bool,
    /// Zero whenever the probe failed. Zero means "not measured", not "fast".
    pub latency: Duration,
}

impl ProbeOutcome {
    pub fn up(latency: Duration) -> Self {
        Self { is_up: true, latency }
    }

    pub fn down() -> Self {
        Self {
            is_up: false,
            latency: Duration::ZERO,
        }
    }

    pub fn latency_seconds(&self) -> f64 {
        self.latency.as_secs_f64()
    }
}

impl From<&Result<Duration, ProbeError>> for ProbeOutcome {
    fn from(result: &Result<Duration, ProbeError>) -> Self {
        match result {
            Ok(latency) => Self::up(*latency),
            Err(_) => Self::down(),
        }
    }
}

/// Result of probing one target during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub target_id: i64,
    pub url_label: String,
    pub owner_id: String,
    pub is_up: bool,
    pub latency_seconds: f64,
    pub observed_at: DateTime<Utc>,
}

/// The stable series label for a stored URL: one trailing slash removed.
pub fn url_label(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// The URL actually requested: `https://` is assumed when no scheme is given.
pub fn probe_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
