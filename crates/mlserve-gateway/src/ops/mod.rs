//! Operational HTTP endpoints.
//!
//! - `/`                : service banner with model count
//! - `/health`          : readiness (503 until at least one model is loaded)
//! - `/models`          : registered models
//! - `/models/refresh`  : re-scan the model directory
//! - `/metrics`         : Prometheus text format
//! - `/metrics/summary` : aggregated JSON view

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::app_state::AppState;
use crate::inference::ApiError;

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "mlserve inference",
        "status": "operational",
        "model_count": state.registry().len(),
    }))
}

pub async fn health(State(state): State<AppState>) -> Response {
    let models = state.registry().len();
    if models == 0 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "detail": "No models available" })),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": Utc::now(),
            "models_loaded": models,
        })),
    )
        .into_response()
}

pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "models": state.registry().list_available() }))
}

pub async fn refresh_models(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state.refresh_models().await?;
    Ok(Json(json!({
        "grew": report.grew(),
        "loaded": report.loaded,
        "skipped": report.skipped,
    }))
    .into_response())
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics().render();

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn metrics_summary(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics().summary())
}
