//! Predictors and the values flowing through them.
//!
//! A loaded model is opaque to the rest of the system: it declares which
//! input features it consumes, whether it reports class probabilities, and
//! maps a numeric feature row to a [`Prediction`].
//!
//! - `artifact`: on-disk model documents and metadata files.
//! - `predictors`: the concrete model kinds an artifact can hold.

pub mod artifact;
pub mod predictors;

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MlServeError, Result};

/// Request features as received (`name -> JSON value`).
pub type FeatureMap = Map<String, Value>;

/// What a predictor can report besides the point prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// A single value per row.
    Point,
    /// A class label plus a probability per class.
    Probabilistic,
}

/// Prediction result, tagged by the capability that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prediction {
    Point {
        value: f64,
    },
    Probabilistic {
        label: String,
        classes: Vec<String>,
        probabilities: Vec<f64>,
    },
}

impl Prediction {
    /// Highest class probability, if the prediction carries any.
    pub fn confidence(&self) -> Option<f64> {
        match self {
            Prediction::Point { .. } => None,
            Prediction::Probabilistic { probabilities, .. } => {
                probabilities.iter().copied().reduce(f64::max)
            }
        }
    }
}

/// Numeric input row, aligned with a predictor's `inputs()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<(String, f64)>,
}

impl FeatureRow {
    /// Preprocess raw request features into the row a predictor expects.
    ///
    /// Features the predictor does not consume are ignored. A missing input or
    /// a non-numeric value is a client error.
    pub fn from_features(inputs: &[String], features: &FeatureMap) -> Result<Self> {
        let mut values = Vec::with_capacity(inputs.len());
        for name in inputs {
            let raw = features
                .get(name)
                .ok_or_else(|| MlServeError::BadRequest(format!("missing feature: {name}")))?;
            values.push((name.clone(), numeric(name, raw)?));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of one named input.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// `(feature, value)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

fn numeric(name: &str, raw: &Value) -> Result<f64> {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| MlServeError::BadRequest(format!("feature {name} is not a finite number"))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(MlServeError::BadRequest(format!(
            "feature {name} must be numeric, got {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An opaque loaded model.
pub trait Predictor: Send + Sync + fmt::Debug {
    /// Which prediction shape this model produces.
    fn capability(&self) -> Capability;

    /// Input feature names, in the order `predict` reads them.
    fn inputs(&self) -> &[String];

    /// Run the model on one preprocessed row.
    fn predict(&self, row: &FeatureRow) -> Result<Prediction>;
}
