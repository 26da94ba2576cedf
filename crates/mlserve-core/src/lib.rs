//! mlserve core: model artifacts, the model registry, and the metrics recorder.
//!
//! This crate holds everything the inference service needs that is not tied to
//! HTTP: loading and versioning predictors from a directory, running them on a
//! feature row, and aggregating prediction outcomes into labeled counters,
//! histograms and gauges. It carries no transport or runtime dependencies so
//! the gateway and tests can share it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! A corrupt artifact or hostile request surfaces as `MlServeError`/`Result`,
//! never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metrics;
pub mod model;
pub mod registry;

/// Shared result type.
pub use error::{ClientCode, MlServeError, Result};
pub use metrics::{MetricEvent, MetricsSummary, ModelMetrics};
pub use model::{Capability, FeatureMap, FeatureRow, Prediction, Predictor};
pub use registry::{ModelEntry, ModelInfo, ModelRegistry, ScanReport};
