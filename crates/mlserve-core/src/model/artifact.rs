//! On-disk artifact formats.
//!
//! An artifact is a `<stem>.model` JSON document describing one predictor,
//! optionally accompanied by `<stem>.meta` JSON metadata. When the metadata
//! file exists it must carry `version` and `loaded_at`:
//!
//! ```json
//! {"version": "v1", "loaded_at": "2024-01-15T10:30:00Z", "features": ["age", "income"]}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{MlServeError, Result};

use super::predictors::{LinearRegressor, LogisticClassifier, SoftmaxClassifier};
use super::Predictor;

/// File extension of model documents.
pub const MODEL_EXTENSION: &str = "model";
/// File extension of companion metadata files.
pub const METADATA_EXTENSION: &str = "meta";

/// Serialized predictor, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelDocument {
    Linear {
        weights: BTreeMap<String, f64>,
        #[serde(default)]
        intercept: f64,
    },
    Logistic {
        weights: BTreeMap<String, f64>,
        #[serde(default)]
        intercept: f64,
        classes: [String; 2],
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    Softmax {
        classes: Vec<String>,
        weights: BTreeMap<String, BTreeMap<String, f64>>,
        #[serde(default)]
        intercepts: BTreeMap<String, f64>,
    },
}

fn default_threshold() -> f64 {
    0.5
}

impl ModelDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MlServeError::InvalidArtifact(format!("model document: {e}")))
    }

    /// Validate and build the runtime predictor.
    pub fn into_predictor(self) -> Result<Box<dyn Predictor>> {
        match self {
            ModelDocument::Linear { weights, intercept } => {
                check_finite(weights.values().chain([&intercept]))?;
                Ok(Box::new(LinearRegressor::new(weights, intercept)))
            }
            ModelDocument::Logistic { weights, intercept, classes, threshold } => {
                check_finite(weights.values().chain([&intercept]))?;
                Ok(Box::new(LogisticClassifier::new(weights, intercept, classes, threshold)?))
            }
            ModelDocument::Softmax { classes, weights, intercepts } => {
                check_finite(weights.values().flat_map(|w| w.values()).chain(intercepts.values()))?;
                Ok(Box::new(SoftmaxClassifier::new(classes, weights, intercepts)?))
            }
        }
    }
}

fn check_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> Result<()> {
    if values.all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(MlServeError::InvalidArtifact("model parameters must be finite".into()))
    }
}

/// Contents of a `.meta` file. Unknown keys are tolerated.
#[derive(Debug, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    pub loaded_at: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl ArtifactMetadata {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let meta: Self = serde_json::from_slice(bytes)
            .map_err(|e| MlServeError::InvalidArtifact(format!("metadata: {e}")))?;
        if meta.version.trim().is_empty() {
            return Err(MlServeError::InvalidArtifact("metadata version must not be empty".into()));
        }
        Ok(meta)
    }

    pub fn loaded_at(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.loaded_at)
    }
}

/// Accept RFC 3339, or a naive ISO-8601 timestamp interpreted as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(MlServeError::InvalidArtifact(format!("invalid loaded_at timestamp: {s}")))
}
