//! Range queries against a Prometheus-compatible HTTP API.

use std::time::Duration;

use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;

use super::{RangeQuery, Sample, SeriesError, SeriesMetric};

/// Client for `GET /api/v1/query_range`.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    client: Client,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SeriesError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Fetch one site's samples for `metric` over the query range, oldest first.
    pub async fn query_range(
        &self,
        metric: SeriesMetric,
        query: &RangeQuery,
    ) -> Result<Vec<Sample>, SeriesError> {
        let params = [
            ("query", selector(metric.name(), &query.url_label, &query.owner_id)),
            ("start", query.start.timestamp().to_string()),
            ("end", query.end.timestamp().to_string()),
            ("step", format!("{}s", query.step.num_seconds().max(1))),
        ];

        let response = self
            .client
            .get(format!("{}/api/v1/query_range", self.base_url))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = serde_json::from_str::<ApiResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(SeriesError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| SeriesError::Decode(e.to_string()))?;
        range_samples(body)
    }
}

/// Series selector for one site's metric.
///
/// Label values are written as JSON strings, whose escapes PromQL accepts.
pub fn selector(metric: &str, url_label: &str, owner_id: &str) -> String {
    format!(
        "{}{{url={},owner_id={}}}",
        metric,
        serde_json::Value::from(url_label),
        serde_json::Value::from(owner_id)
    )
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<MatrixData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<MatrixSeries>,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    values: Vec<(f64, String)>,
}

/// Turn a decoded `query_range` response into samples sorted by time.
///
/// Samples from every returned series are merged. The sort is stable, so
/// samples sharing an instant keep the order the backend sent them in.
/// Non-finite values are skipped.
fn range_samples(response: ApiResponse) -> Result<Vec<Sample>, SeriesError> {
    if response.status != "success" {
        return Err(SeriesError::Backend {
            status: 200,
            message: response.error.unwrap_or(response.status),
        });
    }

    let data = response
        .data
        .ok_or_else(|| SeriesError::Decode("missing data".to_string()))?;

    if data.result_type != "matrix" {
        return Err(SeriesError::Decode(format!(
            "expected matrix result, got {}",
            data.result_type
        )));
    }

    let mut samples = Vec::new();
    for series in data.result {
        for (ts, raw) in series.values {
            let value: f64 = raw
                .parse()
                .map_err(|_| SeriesError::Decode(format!("bad sample value {:?}", raw)))?;
            if !value.is_finite() {
                continue;
            }

            let at = DateTime::from_timestamp_millis((ts * 1000.0).round() as i64)
                .ok_or_else(|| SeriesError::Decode(format!("bad timestamp {}", ts)))?;
            samples.push(Sample::new(at, value));
        }
    }

    samples.sort_by_key(|s| s.at);
    Ok(samples)
}
