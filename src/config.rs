//! Configuration module for DevPulse.
//!
//! Loads configuration from environment variables with sensible defaults.

use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Lowest probe timeout accepted. Anything shorter flags slow-but-healthy sites.
pub const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite site registry (default: "devpulse.db")
    pub db_path: String,
    /// Period between check cycles (default: 60s)
    pub check_interval: Duration,
    /// Per-probe timeout (default: 15s, never below 5s)
    pub probe_timeout: Duration,
    /// Maximum probes in flight during a cycle (default: 16)
    pub probe_concurrency: usize,
    /// Base URL of the Prometheus-compatible time-series backend
    pub prometheus_url: String,
    /// Offset from UTC, in minutes, used to bucket heatmap cells
    pub report_utc_offset_minutes: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "devpulse.db".to_string(),
            check_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(15),
            probe_concurrency: 16,
            prometheus_url: "http://localhost:9090".to_string(),
            report_utc_offset_minutes: 0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DEVPULSE_HTTP_PORT`: HTTP port (default: 8080)
    /// - `DEVPULSE_DB_PATH`: Database file path (default: "devpulse.db")
    /// - `DEVPULSE_CHECK_INTERVAL_SECS`: Cycle period in seconds (default: 60)
    /// - `DEVPULSE_PROBE_TIMEOUT_SECS`: Probe timeout in seconds (default: 15, min 5)
    /// - `DEVPULSE_PROBE_CONCURRENCY`: Probe worker count (default: 16)
    /// - `DEVPULSE_PROMETHEUS_URL`: Time-series backend (default: "http://localhost:9090")
    /// - `DEVPULSE_REPORT_UTC_OFFSET_MINUTES`: Heatmap timezone offset (default: 0)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "DEVPULSE_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("DEVPULSE_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "DEVPULSE_CHECK_INTERVAL_SECS") {
            cfg.check_interval = Duration::from_secs(secs.max(1));
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "DEVPULSE_PROBE_TIMEOUT_SECS") {
            cfg.probe_timeout = Duration::from_secs(secs).max(MIN_PROBE_TIMEOUT);
        }

        if let Some(n) = parse_var::<usize, _>(&lookup, "DEVPULSE_PROBE_CONCURRENCY") {
            cfg.probe_concurrency = n.max(1);
        }

        if let Some(url) = lookup("DEVPULSE_PROMETHEUS_URL") {
            cfg.prometheus_url = url.trim_end_matches('/').to_string();
        }

        if let Some(offset) = parse_var(&lookup, "DEVPULSE_REPORT_UTC_OFFSET_MINUTES") {
            cfg.report_utc_offset_minutes = offset;
        }

        cfg
    }

    /// Timezone used to place samples in the hour-of-week heatmap.
    ///
    /// Offsets outside ±24h fall back to UTC.
    pub fn report_offset(&self) -> FixedOffset {
        self.report_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}
