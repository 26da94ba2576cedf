//! Active-connection tracking middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use mlserve_core::ModelMetrics;

use crate::app_state::AppState;

/// Decrements the gauge on drop, so early returns and unwinding are covered.
pub struct ConnectionGuard {
    metrics: Arc<ModelMetrics>,
}

impl ConnectionGuard {
    pub fn new(metrics: Arc<ModelMetrics>) -> Self {
        metrics.record_connection();
        Self { metrics }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.metrics.record_disconnection();
    }
}

pub async fn track_connections(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let _guard = ConnectionGuard::new(state.metrics());
    next.run(req).await
}
