//! Concrete model kinds.
//!
//! All three are linear in their inputs; they differ in the link function and
//! in whether they report class probabilities.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MlServeError, Result};

use super::{Capability, FeatureRow, Predictor, Prediction};

/// `value = intercept + sum(w_i * x_i)`.
#[derive(Debug)]
pub struct LinearRegressor {
    inputs: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearRegressor {
    pub fn new(weights: BTreeMap<String, f64>, intercept: f64) -> Self {
        let (inputs, weights) = weights.into_iter().unzip();
        Self { inputs, weights, intercept }
    }
}

impl Predictor for LinearRegressor {
    fn capability(&self) -> Capability {
        Capability::Point
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn predict(&self, row: &FeatureRow) -> Result<Prediction> {
        let value = finite(dot(&self.inputs, &self.weights, row)? + self.intercept)?;
        Ok(Prediction::Point { value })
    }
}

/// Binary classifier: `p(positive) = sigmoid(intercept + w.x)`.
#[derive(Debug)]
pub struct LogisticClassifier {
    inputs: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
    classes: [String; 2],
    threshold: f64,
}

impl LogisticClassifier {
    pub fn new(
        weights: BTreeMap<String, f64>,
        intercept: f64,
        classes: [String; 2],
        threshold: f64,
    ) -> Result<Self> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(MlServeError::InvalidArtifact(format!(
                "logistic threshold must be in (0, 1), got {threshold}"
            )));
        }
        if classes[0] == classes[1] {
            return Err(MlServeError::InvalidArtifact("logistic classes must differ".into()));
        }
        let (inputs, weights) = weights.into_iter().unzip();
        Ok(Self { inputs, weights, intercept, classes, threshold })
    }
}

impl Predictor for LogisticClassifier {
    fn capability(&self) -> Capability {
        Capability::Probabilistic
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn predict(&self, row: &FeatureRow) -> Result<Prediction> {
        let z = finite(dot(&self.inputs, &self.weights, row)? + self.intercept)?;
        let positive = 1.0 / (1.0 + (-z).exp());
        let label = if positive >= self.threshold { &self.classes[1] } else { &self.classes[0] };
        Ok(Prediction::Probabilistic {
            label: label.clone(),
            classes: self.classes.to_vec(),
            probabilities: vec![1.0 - positive, positive],
        })
    }
}

/// Multi-class classifier: one linear score per class, normalized with softmax.
#[derive(Debug)]
pub struct SoftmaxClassifier {
    inputs: Vec<String>,
    classes: Vec<String>,
    /// `weights[class][input]`, dense over `inputs`.
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl SoftmaxClassifier {
    pub fn new(
        classes: Vec<String>,
        weights: BTreeMap<String, BTreeMap<String, f64>>,
        intercepts: BTreeMap<String, f64>,
    ) -> Result<Self> {
        if classes.len() < 2 {
            return Err(MlServeError::InvalidArtifact("softmax needs at least two classes".into()));
        }
        let unique: BTreeSet<&String> = classes.iter().collect();
        if unique.len() != classes.len() {
            return Err(MlServeError::InvalidArtifact("softmax classes must be unique".into()));
        }
        for class in weights.keys().chain(intercepts.keys()) {
            if !unique.contains(class) {
                return Err(MlServeError::InvalidArtifact(format!("unknown class in weights: {class}")));
            }
        }

        let inputs: Vec<String> = weights
            .values()
            .flat_map(|w| w.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let dense = classes
            .iter()
            .map(|class| {
                let per_class = weights.get(class);
                inputs
                    .iter()
                    .map(|name| per_class.and_then(|w| w.get(name)).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        let intercepts = classes
            .iter()
            .map(|c| intercepts.get(c).copied().unwrap_or(0.0))
            .collect();

        Ok(Self { inputs, classes, weights: dense, intercepts })
    }
}

impl Predictor for SoftmaxClassifier {
    fn capability(&self) -> Capability {
        Capability::Probabilistic
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn predict(&self, row: &FeatureRow) -> Result<Prediction> {
        let mut scores = Vec::with_capacity(self.classes.len());
        for (w, b) in self.weights.iter().zip(&self.intercepts) {
            scores.push(finite(dot(&self.inputs, w, row)? + b)?);
        }

        // shift by the max score so exp() cannot overflow
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        let probabilities: Vec<f64> = exps.iter().map(|e| e / total).collect();

        let best = probabilities
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > probabilities[best] { i } else { best });

        Ok(Prediction::Probabilistic {
            label: self.classes[best].clone(),
            classes: self.classes.clone(),
            probabilities,
        })
    }
}

fn dot(inputs: &[String], weights: &[f64], row: &FeatureRow) -> Result<f64> {
    let mut acc = 0.0;
    for (name, w) in inputs.iter().zip(weights) {
        let x = row
            .get(name)
            .ok_or_else(|| MlServeError::Prediction(format!("row is missing input {name}")))?;
        acc += w * x;
    }
    Ok(acc)
}

fn finite(v: f64) -> Result<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(MlServeError::Prediction("model produced a non-finite score".into()))
    }
}
