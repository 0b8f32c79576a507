//! HTTP request handlers.

use super::{AppState, Owner};
use crate::analysis::{
    derive_incidents, heatmap, latency_stats, uptime_ratio, Heatmap, IncidentStatus,
    LatencyStats,
};
use crate::db::{DbError, Target};
use crate::metrics::PROMETHEUS_CONTENT_TYPE;
use crate::probe::url_label;
use crate::series::{RangeQuery, Sample, SeriesError, SeriesMetric};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Window covered by the status summary and incident history.
const HISTORY_WINDOW_HOURS: i64 = 24;
const HISTORY_STEP_SECS: i64 = 60;
/// Window covered by the analytics page.
const ANALYTICS_WINDOW_DAYS: i64 = 7;
const ANALYTICS_STEP_SECS: i64 = 300;

fn message(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "message": msg.into() }))).into_response()
}

fn db_error(e: DbError) -> Response {
    match e {
        DbError::NotFound => message(StatusCode::NOT_FOUND, "Site not found"),
        DbError::Invalid(msg) => message(StatusCode::BAD_REQUEST, msg),
        other => {
            tracing::error!("Registry error: {}", other);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

fn series_error(e: SeriesError) -> Response {
    tracing::warn!("Time-series backend error: {}", e);
    message(StatusCode::BAD_GATEWAY, "Metrics backend unavailable")
}

/// Look up a site, hiding other owners' sites as not found.
fn owned_target(state: &AppState, id: i64, owner: &Owner) -> Result<Target, Response> {
    match state.store.get_target(id) {
        Ok(t) if t.owner_id == owner.0 => Ok(t),
        Ok(_) => Err(db_error(DbError::NotFound)),
        Err(e) => Err(db_error(e)),
    }
}

fn trailing_query(target: &Target, window: ChronoDuration, step_secs: i64) -> RangeQuery {
    RangeQuery::trailing(
        url_label(&target.url),
        &target.owner_id,
        Utc::now(),
        window,
        ChronoDuration::seconds(step_secs),
    )
}

fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

// ============================================================================
// Service
// ============================================================================

pub async fn handle_root() -> impl IntoResponse {
    Json(json!({ "message": "DevPulse backend is running" }))
}

pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

// ============================================================================
// API: Sites
// ============================================================================

pub async fn handle_get_sites(State(state): State<AppState>, owner: Owner) -> Response {
    match state.store.get_targets_by_owner(&owner.0) {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => db_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    #[serde(default)]
    pub url: String,
}

pub async fn handle_create_site(
    State(state): State<AppState>,
    owner: Owner,
    Json(req): Json<CreateSiteRequest>,
) -> Response {
    match state.store.add_target(&req.url, &owner.0) {
        Ok(target) => {
            tracing::info!("Registered {} for {}", target.url, owner.0);
            (StatusCode::CREATED, Json(target)).into_response()
        }
        Err(e) => db_error(e),
    }
}

pub async fn handle_delete_site(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Response {
    match state.store.delete_target(id, &owner.0) {
        Ok(()) => Json(json!({ "message": "Site removed" })).into_response(),
        Err(e) => db_error(e),
    }
}

// ============================================================================
// API: Status, history and analytics
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SiteMetrics {
    pub site_id: i64,
    pub url: String,
    /// "Up", "Down", or "Pending" before the first check.
    pub status: &'static str,
    pub latency_seconds: Option<f64>,
    pub uptime_24h: Option<String>,
    pub avg_response_time_ms: Option<f64>,
}

pub async fn handle_site_metrics(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Response {
    let target = match owned_target(&state, id, &owner) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let current = state.sink.snapshot(url_label(&target.url), &target.owner_id);
    let status = match current {
        Some(pair) if pair.up == 1 => "Up",
        Some(_) => "Down",
        None => "Pending",
    };

    let query = trailing_query(
        &target,
        ChronoDuration::hours(HISTORY_WINDOW_HOURS),
        HISTORY_STEP_SECS,
    );
    let (up, latency) = tokio::join!(
        state.series.query_range(SeriesMetric::Up, &query),
        state.series.query_range(SeriesMetric::Latency, &query),
    );

    // The live status is still worth showing when history is unavailable
    let up = degrade(up);
    let latency = degrade(latency);

    Json(SiteMetrics {
        site_id: target.id,
        url: target.url,
        status,
        latency_seconds: current.filter(|p| p.up == 1).map(|p| p.latency_seconds),
        uptime_24h: uptime_ratio(&up).map(format_percent),
        avg_response_time_ms: latency_stats(&latency).map(|s| (s.avg * 1000.0).round()),
    })
    .into_response()
}

fn degrade(result: Result<Vec<Sample>, SeriesError>) -> Vec<Sample> {
    result.unwrap_or_else(|e| {
        tracing::warn!("Time-series backend error, summary degraded: {}", e);
        Vec::new()
    })
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub status: IncidentStatus,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub duration: String,
    pub ongoing: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub uptime_timeline: Vec<u8>,
    pub recent_events: Vec<EventView>,
}

pub async fn handle_site_history(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Response {
    let target = match owned_target(&state, id, &owner) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let query = trailing_query(
        &target,
        ChronoDuration::hours(HISTORY_WINDOW_HOURS),
        HISTORY_STEP_SECS,
    );
    let samples = match state.series.query_range(SeriesMetric::Up, &query).await {
        Ok(s) => s,
        Err(e) => return series_error(e),
    };

    let history = derive_incidents(&samples);
    let recent_events = history
        .incidents
        .iter()
        .map(|incident| EventView {
            status: incident.status,
            message: incident.message(),
            timestamp: incident.started_at,
            resolved_at: incident.resolved_at,
            duration_minutes: incident.duration_minutes,
            duration: incident.duration_label(),
            ongoing: incident.is_ongoing(),
        })
        .collect();

    Json(HistoryResponse {
        uptime_timeline: history.uptime_timeline,
        recent_events,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub latency_seconds: Option<LatencyStats>,
    pub uptime_ratio: Option<f64>,
    pub heatmap: Heatmap,
}

pub async fn handle_site_analytics(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Response {
    let target = match owned_target(&state, id, &owner) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let query = trailing_query(
        &target,
        ChronoDuration::days(ANALYTICS_WINDOW_DAYS),
        ANALYTICS_STEP_SECS,
    );
    let (up, latency) = tokio::join!(
        state.series.query_range(SeriesMetric::Up, &query),
        state.series.query_range(SeriesMetric::Latency, &query),
    );
    let (up, latency) = match (up, latency) {
        (Ok(up), Ok(latency)) => (up, latency),
        (Err(e), _) | (_, Err(e)) => return series_error(e),
    };

    Json(AnalyticsResponse {
        latency_seconds: latency_stats(&latency),
        uptime_ratio: uptime_ratio(&up),
        heatmap: heatmap(&up, state.config.report_offset()),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::Store;
    use crate::metrics::{MetricsRegistry, MetricsSink};
    use crate::probe::ProbeResult;
    use crate::series::PrometheusClient;
    use axum::body::to_bytes;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Fake backend: the up series alternates 1,1,0,0,1 one minute apart,
    /// latency reads 0.1s, 0.3s and one unmeasured sample.
    async fn spawn_backend() -> String {
        let app = Router::new().route(
            "/api/v1/query_range",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let query = params.get("query").cloned().unwrap_or_default();
                let t0 = 1704067200;
                let values: Vec<(i64, &str)> = if query.starts_with("website_up") {
                    vec![(t0, "1"), (t0 + 60, "1"), (t0 + 120, "0"), (t0 + 180, "0"), (t0 + 240, "1")]
                } else {
                    vec![(t0, "0.1"), (t0 + 60, "0.3"), (t0 + 120, "0")]
                };
                Json(json!({
                    "status": "success",
                    "data": {"resultType": "matrix", "result": [{"metric": {}, "values": values}]}
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn test_state(backend: &str) -> (NamedTempFile, AppState) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let sink = Arc::new(MetricsSink::new());
        let state = AppState {
            config: ServerConfig::default(),
            store,
            metrics: MetricsRegistry::new(sink.clone()).unwrap(),
            sink,
            series: PrometheusClient::new(backend, Duration::from_secs(2)).unwrap(),
        };
        (tmp, state)
    }

    fn alice() -> Owner {
        Owner("alice".to_string())
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_list_delete_site() {
        let (_tmp, state) = test_state("http://127.0.0.1:9");

        let resp = handle_create_site(
            State(state.clone()),
            alice(),
            Json(CreateSiteRequest { url: "example.com".to_string() }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        let id = created["id"].as_i64().unwrap();

        let resp = handle_get_sites(State(state.clone()), alice()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);

        // Someone else sees nothing and cannot delete it
        let bob = Owner("bob".to_string());
        let resp = handle_get_sites(State(state.clone()), bob.clone()).await;
        assert!(body_json(resp).await.as_array().unwrap().is_empty());
        let resp = handle_delete_site(State(state.clone()), bob, Path(id)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = handle_delete_site(State(state), alice(), Path(id)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_site_requires_url() {
        let (_tmp, state) = test_state("http://127.0.0.1:9");
        let resp = handle_create_site(
            State(state),
            alice(),
            Json(CreateSiteRequest { url: String::new() }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["message"], "URL is required");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_sink() {
        let (_tmp, state) = test_state("http://127.0.0.1:9");
        state.sink.record(&ProbeResult {
            target_id: 1,
            url_label: "https://a.example".to_string(),
            owner_id: "alice".to_string(),
            is_up: true,
            latency_seconds: 0.05,
            observed_at: Utc::now(),
        });

        let resp = handle_metrics(State(state)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            PROMETHEUS_CONTENT_TYPE
        );
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("website_up{owner_id=\"alice\",url=\"https://a.example\"} 1"));
    }

    #[tokio::test]
    async fn test_history_from_backend() {
        let backend = spawn_backend().await;
        let (_tmp, state) = test_state(&backend);
        let target = state.store.add_target("https://a.example/", "alice").unwrap();

        let resp = handle_site_history(State(state), alice(), Path(target.id)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["uptime_timeline"], json!([1, 1, 0, 0, 1]));
        let events = body["recent_events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["status"], "Resolved");
        assert_eq!(events[1]["status"], "Down");
        assert_eq!(events[1]["duration"], "2 min");
    }

    #[tokio::test]
    async fn test_site_metrics_summary() {
        let backend = spawn_backend().await;
        let (_tmp, state) = test_state(&backend);
        let target = state.store.add_target("https://a.example/", "alice").unwrap();
        state.sink.set_up("https://a.example", "alice", true);
        state.sink.set_latency("https://a.example", "alice", 0.12);

        let resp = handle_site_metrics(State(state), alice(), Path(target.id)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "Up");
        assert_eq!(body["latency_seconds"], 0.12);
        assert_eq!(body["uptime_24h"], "60.00%");
        assert_eq!(body["avg_response_time_ms"], 200.0);
    }

    #[tokio::test]
    async fn test_site_metrics_degrades_without_backend() {
        let (_tmp, state) = test_state("http://127.0.0.1:9");
        let target = state.store.add_target("https://a.example", "alice").unwrap();

        let resp = handle_site_metrics(State(state), alice(), Path(target.id)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "Pending");
        assert!(body["uptime_24h"].is_null());
    }

    #[tokio::test]
    async fn test_history_requires_backend() {
        let (_tmp, state) = test_state("http://127.0.0.1:9");
        let target = state.store.add_target("https://a.example", "alice").unwrap();

        let resp = handle_site_history(State(state), alice(), Path(target.id)).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_analytics() {
        let backend = spawn_backend().await;
        let (_tmp, state) = test_state(&backend);
        let target = state.store.add_target("https://a.example", "alice").unwrap();

        let resp = handle_site_analytics(State(state.clone()), alice(), Path(target.id)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["latency_seconds"]["count"], 2);
        assert_eq!(body["uptime_ratio"], 0.6);
        // 2024-01-01 00:04 UTC is Monday, hour 0; last write is up
        assert_eq!(body["heatmap"]["cells"][1][0], "up");
        assert_eq!(body["heatmap"]["cells"][0][0], "no_data");

        // Other owners get a 404
        let resp = handle_site_analytics(
            State(state),
            Owner("bob".to_string()),
            Path(target.id),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
