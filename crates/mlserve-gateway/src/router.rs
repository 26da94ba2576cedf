//! Axum router wiring.
//!
//! Every route runs behind the connection-tracking middleware.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, inference, obs::connections, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ops::root))
        .route("/health", get(ops::health))
        .route("/predict", post(inference::predict))
        .route("/models", get(ops::list_models))
        .route("/models/refresh", post(ops::refresh_models))
        .route("/metrics", get(ops::metrics))
        .route("/metrics/summary", get(ops::metrics_summary))
        .layer(middleware::from_fn_with_state(state.clone(), connections::track_connections))
        .with_state(state)
}
