//! Off-path metric recording.
//!
//! Handlers hand metric updates to a bounded channel drained by one background
//! task, so recording never delays a response. When the queue is full or the
//! worker is gone, the update is applied inline instead of being dropped.
//! `flush` waits until every update queued before it has been applied; the
//! binary calls it after the server stops accepting requests.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use mlserve_core::{MetricEvent, ModelMetrics};

const QUEUE_CAPACITY: usize = 4096;

#[derive(Debug)]
enum Command {
    Prediction(MetricEvent),
    Drift { feature: String, value: f64 },
    Error { error_type: &'static str, model_version: String },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct MetricsPipeline {
    tx: mpsc::Sender<Command>,
    metrics: Arc<ModelMetrics>,
}

impl MetricsPipeline {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(metrics: Arc<ModelMetrics>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Command>(QUEUE_CAPACITY);
        let worker_metrics = Arc::clone(&metrics);

        let handle = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Flush(ack) => {
                        let _ = ack.send(());
                    }
                    other => apply(&worker_metrics, other),
                }
            }
            tracing::debug!("metrics pipeline closed");
        });

        (Self { tx, metrics }, handle)
    }

    pub fn metrics(&self) -> &Arc<ModelMetrics> {
        &self.metrics
    }

    pub fn record_prediction(&self, event: MetricEvent) {
        self.submit(Command::Prediction(event));
    }

    pub fn record_data_drift(&self, feature: impl Into<String>, value: f64) {
        self.submit(Command::Drift { feature: feature.into(), value });
    }

    pub fn record_error(&self, error_type: &'static str, model_version: impl Into<String>) {
        self.submit(Command::Error { error_type, model_version: model_version.into() });
    }

    /// Wait until everything queued so far has been applied.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    fn submit(&self, cmd: Command) {
        if let Err(e) = self.tx.try_send(cmd) {
            let cmd = match e {
                mpsc::error::TrySendError::Full(c) => {
                    tracing::debug!("metrics queue full, recording inline");
                    c
                }
                mpsc::error::TrySendError::Closed(c) => c,
            };
            apply(&self.metrics, cmd);
        }
    }
}

fn apply(metrics: &ModelMetrics, cmd: Command) {
    match cmd {
        Command::Prediction(ev) => metrics.record(&ev),
        Command::Drift { feature, value } => metrics.record_data_drift(&feature, value),
        Command::Error { error_type, model_version } => metrics.record_error(error_type, &model_version),
        Command::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}
