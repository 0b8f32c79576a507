//! Read access to the time-series backend that scrapes the gauge set.
//!
//! The backend owns history; this module only asks it for ranged samples
//! of one site's series and hands them to the analysis functions.

mod prometheus;

pub use self::prometheus::*;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::metrics::{LATENCY_METRIC, UP_METRIC};

/// Range query error types.
#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

/// One recorded value of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub at: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(at: DateTime<Utc>, value: f64) -> Self {
        Self { at, value }
    }
}

/// The two series written for every site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMetric {
    Up,
    Latency,
}

impl SeriesMetric {
    pub fn name(self) -> &'static str {
        match self {
            SeriesMetric::Up => UP_METRIC,
            SeriesMetric::Latency => LATENCY_METRIC,
        }
    }
}

/// A ranged read of one site's series.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub url_label: String,
    pub owner_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: ChronoDuration,
}

impl RangeQuery {
    /// Query the `window` leading up to `end`.
    pub fn trailing(
        url_label: &str,
        owner_id: &str,
        end: DateTime<Utc>,
        window: ChronoDuration,
        step: ChronoDuration,
    ) -> Self {
        Self {
            url_label: url_label.to_string(),
            owner_id: owner_id.to_string(),
            start: end - window,
            end,
            step,
        }
    }
}
