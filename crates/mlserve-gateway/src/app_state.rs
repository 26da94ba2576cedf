//! Shared application state for the inference service.
//!
//! - One `ModelRegistry` and one `ModelMetrics` per process, shared by handle.
//! - Metric updates from handlers go through the `MetricsPipeline`.
//! - Registry refreshes are serialized behind `refresh_gate`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use mlserve_core::error::{MlServeError, Result};
use mlserve_core::{ModelMetrics, ModelRegistry, ScanReport};

use crate::config::ServiceConfig;
use crate::obs::{resources, MetricsPipeline};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    registry: Arc<ModelRegistry>,
    pipeline: MetricsPipeline,
}

struct AppStateInner {
    cfg: ServiceConfig,
    refresh_gate: Mutex<()>,
}

impl AppState {
    /// Build application state and run the initial model scan.
    ///
    /// Must be called inside a tokio runtime (the metrics worker is spawned
    /// here). An empty or missing model directory is not an error.
    pub fn new(cfg: ServiceConfig) -> (Self, JoinHandle<()>) {
        let metrics = Arc::new(ModelMetrics::new(&cfg.metrics.namespace, &cfg.metrics.subsystem));

        let (registry, report) = ModelRegistry::open(&cfg.registry.models_dir);
        if registry.is_empty() {
            tracing::warn!(dir = %cfg.registry.models_dir.display(), "no models available");
        } else if let Some(latest) = registry.get_latest() {
            tracing::info!(
                version = %latest.version,
                loaded = report.loaded.len(),
                skipped = report.skipped.len(),
                "model registry ready"
            );
        }

        let (pipeline, worker) = MetricsPipeline::spawn(metrics);
        let state = Self {
            inner: Arc::new(AppStateInner { cfg, refresh_gate: Mutex::new(()) }),
            registry: Arc::new(registry),
            pipeline,
        };
        resources::publish_model_memory(&state);
        (state, worker)
    }

    pub fn cfg(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<ModelRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<ModelMetrics> {
        Arc::clone(self.pipeline.metrics())
    }

    pub fn pipeline(&self) -> &MetricsPipeline {
        &self.pipeline
    }

    /// Readiness: at least one model is loaded.
    pub fn is_ready(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Re-scan the model directory; at most one scan runs at a time.
    pub async fn refresh_models(&self) -> Result<ScanReport> {
        let _gate = self.inner.refresh_gate.lock().await;
        let registry = self.registry();
        let report = tokio::task::spawn_blocking(move || registry.load())
            .await
            .map_err(|e| MlServeError::Internal(format!("refresh task failed: {e}")))?;

        resources::publish_model_memory(self);
        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            grew = report.grew(),
            "model registry refreshed"
        );
        Ok(report)
    }
}
