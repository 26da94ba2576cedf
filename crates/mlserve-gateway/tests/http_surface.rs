//! Requests through the full router, plus the paths handlers reach only on
//! malformed input or a stopped metrics worker.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mlserve_core::{MetricEvent, ModelMetrics};
use mlserve_gateway::app_state::AppState;
use mlserve_gateway::config::ServiceConfig;
use mlserve_gateway::inference::handler::INVALID_REQUEST;
use mlserve_gateway::inference::{predict, PredictionRequest};
use mlserve_gateway::obs::MetricsPipeline;
use mlserve_gateway::ops;
use mlserve_gateway::router::build_router;

fn state_for(dir: &Path) -> AppState {
    let mut cfg = ServiceConfig::default();
    cfg.registry.models_dir = dir.to_path_buf();
    AppState::new(cfg).0
}

fn write_model(dir: &Path, name: &str) {
    fs::write(
        dir.join(format!("{name}.model")),
        r#"{"kind": "linear", "weights": {"x": 1.0}}"#,
    )
    .unwrap();
}

async fn serve(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    addr
}

/// One HTTP/1.1 exchange on a fresh connection; returns status and body.
async fn send(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some(b) = body {
        req.push_str(&format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{b}",
            b.len()
        ));
    } else {
        req.push_str("Content-Length: 0\r\n\r\n");
    }
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    (status, body.to_string())
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn router_serves_every_route() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path(), "v1");
    let state = state_for(tmp.path());
    let addr = serve(state.clone()).await;

    let (status, body) = send(addr, "GET", "/", None).await;
    assert_eq!(status, 200);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], "operational");
    assert_eq!(v["model_count"], 1);

    let (status, _) = send(addr, "GET", "/health", None).await;
    assert_eq!(status, 200);

    let (status, body) = send(addr, "POST", "/predict", Some(r#"{"features": {"x": 2.0}}"#)).await;
    assert_eq!(status, 200);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["model_version"], "v1");

    let (status, body) = send(addr, "GET", "/models", None).await;
    assert_eq!(status, 200);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["models"][0]["version"], "v1");

    let (status, _) = send(addr, "POST", "/models/refresh", None).await;
    assert_eq!(status, 200);

    state.pipeline().flush().await;
    let (status, body) = send(addr, "GET", "/metrics/summary", None).await;
    assert_eq!(status, 200);
    let v: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["total_predictions"]["success"], 1);

    let (status, _) = send(addr, "GET", "/nope", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn requests_pass_through_connection_tracking() {
    let tmp = TempDir::new().unwrap();
    let state = state_for(tmp.path());
    let addr = serve(state.clone()).await;

    // rendered while this very request is in flight
    let (status, body) = send(addr, "GET", "/metrics", None).await;
    assert_eq!(status, 200);
    assert!(body.contains("mlops_inference_active_connections 1"));

    assert_eq!(state.metrics().active_connections(), 0.0);
}

#[tokio::test]
async fn malformed_body_over_http_is_400() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path(), "v1");
    let state = state_for(tmp.path());
    let addr = serve(state.clone()).await;

    let (status, _) = send(addr, "POST", "/predict", Some("{not json")).await;
    assert_eq!(status, 400);

    state.pipeline().flush().await;
    let errors = state
        .metrics()
        .errors_total
        .get(&[("error_type", INVALID_REQUEST), ("model_version", "unknown")]);
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn undecodable_body_is_recorded_as_invalid_request() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path(), "v1");
    let state = state_for(tmp.path());

    // no content type
    let req = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from(r#"{"features": {"x": 1.0}}"#))
        .unwrap();
    let rejection = Json::<PredictionRequest>::from_request(req, &()).await.unwrap_err();
    let resp = predict(State(state.clone()), Err(rejection)).await.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // unknown field
    let req = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"features": {}, "extra": 1}"#))
        .unwrap();
    let rejection = Json::<PredictionRequest>::from_request(req, &()).await.unwrap_err();
    let resp = predict(State(state.clone()), Err(rejection)).await.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    state.pipeline().flush().await;
    let m = state.metrics();
    assert_eq!(
        m.errors_total.get(&[("error_type", INVALID_REQUEST), ("model_version", "unknown")]),
        2
    );
    // rejected before any prediction was attempted
    assert_eq!(m.summary().total_predictions.error, 0);
}

#[tokio::test]
async fn root_models_and_summary_handlers() {
    let tmp = TempDir::new().unwrap();
    write_model(tmp.path(), "b");
    write_model(tmp.path(), "a");
    let state = state_for(tmp.path());

    let body = body_json(ops::root(State(state.clone())).await.into_response()).await;
    assert_eq!(body["service"], "mlserve inference");
    assert_eq!(body["model_count"], 2);

    let body = body_json(ops::list_models(State(state.clone())).await.into_response()).await;
    let versions: Vec<&str> = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, vec!["a", "b"]);

    let body = body_json(ops::metrics_summary(State(state.clone())).await.into_response()).await;
    assert_eq!(body["total_predictions"]["success"], 0);
    assert!(body["avg_latency_seconds"].is_null());

    state.pipeline().record_prediction(MetricEvent {
        success: true,
        inference_time_ms: 500.0,
        model_version: "a".into(),
        confidence: None,
    });
    state.pipeline().flush().await;

    let body = body_json(ops::metrics_summary(State(state.clone())).await.into_response()).await;
    assert_eq!(body["total_predictions"]["success"], 1);
    assert_eq!(body["latency_observations"], 1);
    assert_eq!(body["avg_latency_seconds"], 0.5);
}

#[tokio::test]
async fn stopped_worker_records_inline() {
    let metrics = Arc::new(ModelMetrics::default());
    let (pipeline, worker) = MetricsPipeline::spawn(Arc::clone(&metrics));
    worker.abort();
    assert!(worker.await.unwrap_err().is_cancelled());

    pipeline.record_error("predict", "v1");
    pipeline.record_data_drift("x", 1.0);
    // returns at once when nothing is draining the queue
    pipeline.flush().await;

    assert_eq!(metrics.errors_total.get(&[("error_type", "predict"), ("model_version", "v1")]), 1);
    assert_eq!(metrics.feature_value.snapshot(&[("feature_name", "x")]).unwrap().count, 1);
}

#[tokio::test]
async fn full_queue_records_inline() {
    let metrics = Arc::new(ModelMetrics::default());
    let (pipeline, _worker) = MetricsPipeline::spawn(Arc::clone(&metrics));

    // the worker cannot run before the first await on this single-threaded runtime
    let overflow = 10;
    for _ in 0..4096 + overflow {
        pipeline.record_error("predict", "v1");
    }
    let labels = [("error_type", "predict"), ("model_version", "v1")];
    assert_eq!(metrics.errors_total.get(&labels), overflow);

    pipeline.flush().await;
    assert_eq!(metrics.errors_total.get(&labels), 4096 + overflow);
}
