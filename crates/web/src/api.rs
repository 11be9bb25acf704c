//! JSON endpoints polled by the dashboard page.

use crate::format::{card_label, format_uptime, net_summary};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dash_core::{ResourceKind, Sample, SampleValue};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::UnknownKind(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub refresh_interval_ms:  u64,
    pub horizon:              usize,
    pub sample_interval_secs: f64,
    pub gpu_available:        bool,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub kind:      ResourceKind,
    /// `false` for GPU series made of placeholders.
    pub available: bool,
    /// Short text for the chart title, e.g. `"12.5%"`.
    pub summary:   String,
    pub samples:   Vec<Sample>,
}

#[derive(Debug, Serialize)]
pub struct TopCard {
    pub kind:      ResourceKind,
    pub name:      String,
    pub pid:       u32,
    pub magnitude: f64,
    pub label:     String,
}

#[derive(Debug, Serialize)]
pub struct UptimeResponse {
    pub seconds: u64,
    pub display: String,
}

pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let settings = state.sampler.settings();
    Json(ConfigResponse {
        refresh_interval_ms:  state.refresh_interval_ms,
        horizon:              state.sampler.metrics().horizon(),
        sample_interval_secs: settings.interval.as_secs_f64(),
        gpu_available:        state.sampler.gpu_available(),
    })
}

pub async fn series(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let kind: ResourceKind = kind.parse().map_err(|_| ApiError::UnknownKind(kind))?;
    let samples = state.sampler.snapshot(kind);
    let available = kind != ResourceKind::Gpu || state.sampler.gpu_available();

    let summary = match samples.last().map(|s| s.value) {
        _ if !available => "unavailable".to_string(),
        None => dash_core::SENTINEL_NAME.to_string(),
        Some(SampleValue::Percent { percent }) => format!("{percent:.1}%"),
        Some(SampleValue::Counters { bytes_sent, bytes_recv }) => net_summary(bytes_sent, bytes_recv),
    };

    Ok(Json(SeriesResponse {
        kind,
        available,
        summary,
        samples,
    }))
}

/// Scan processes on the blocking pool; the sampler's buffers are not touched.
pub async fn top(State(state): State<AppState>) -> Result<Json<Vec<TopCard>>, ApiError> {
    let sampler = state.sampler.clone();
    let cards = tokio::task::spawn_blocking(move || {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let top = sampler.top_consumer(kind);
                TopCard {
                    kind,
                    label: card_label(kind, &top),
                    name: top.name,
                    pid: top.pid,
                    magnitude: top.magnitude,
                }
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("top-consumer scan failed: {e}")))?;

    Ok(Json(cards))
}

pub async fn uptime(State(state): State<AppState>) -> Json<UptimeResponse> {
    let up = state.sampler.uptime();
    Json(UptimeResponse {
        seconds: up.as_secs(),
        display: format_uptime(up),
    })
}
