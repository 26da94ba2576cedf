//! Model registry: directory scan, versioning, and latest resolution.
//!
//! The `version -> entry` map lives behind an `ArcSwap`. A scan clones the
//! current map, applies every successfully loaded artifact, and swaps the new
//! map in whole, so readers see either the old or the new snapshot and never a
//! partial one. Scans only add or replace; entries whose files disappeared
//! from disk stay registered until the process restarts.
//!
//! Scans are assumed to be serialized by the caller (at most one in flight).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{MlServeError, Result};
use crate::model::artifact::{ArtifactMetadata, ModelDocument, METADATA_EXTENSION, MODEL_EXTENSION};
use crate::model::{Capability, FeatureMap, FeatureRow, Prediction, Predictor};

/// One loaded artifact.
#[derive(Debug)]
pub struct ModelEntry {
    pub version: String,
    pub loaded_at: DateTime<Utc>,
    /// Declared input features (informational).
    pub features: Vec<String>,
    pub artifact_path: PathBuf,
    pub artifact_bytes: u64,
    handle: Box<dyn Predictor>,
}

impl ModelEntry {
    pub fn predictor(&self) -> &dyn Predictor {
        self.handle.as_ref()
    }

    pub fn capability(&self) -> Capability {
        self.handle.capability()
    }

    /// Preprocess request features into this model's input row.
    pub fn prepare(&self, features: &FeatureMap) -> Result<FeatureRow> {
        FeatureRow::from_features(self.handle.inputs(), features)
    }

    pub fn predict(&self, row: &FeatureRow) -> Result<Prediction> {
        self.handle.predict(row)
    }

    /// Read-only description of this entry.
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            version: self.version.clone(),
            loaded_at: self.loaded_at,
            features: self.features.clone(),
            capability: self.capability(),
        }
    }
}

/// Snapshot of one entry, safe to hand out to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub version: String,
    pub loaded_at: DateTime<Utc>,
    pub features: Vec<String>,
    pub capability: Capability,
}

/// Artifact that was skipped during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedArtifact {
    pub path: String,
    pub reason: String,
}

/// Outcome of one directory scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Versions loaded (or replaced) by this scan, in scan order.
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedArtifact>,
    pub entries_before: usize,
    pub entries_after: usize,
}

impl ScanReport {
    /// Whether the registry holds more entries than before the scan.
    ///
    /// Replacing an existing version does not count.
    pub fn grew(&self) -> bool {
        self.entries_after > self.entries_before
    }
}

type ModelMap = HashMap<String, Arc<ModelEntry>>;

pub struct ModelRegistry {
    dir: PathBuf,
    models: ArcSwap<ModelMap>,
}

impl ModelRegistry {
    /// Empty registry bound to `dir`; nothing is read until `load`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            models: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Bind to `dir` and run the initial scan.
    pub fn open(dir: impl Into<PathBuf>) -> (Self, ScanReport) {
        let registry = Self::new(dir);
        let report = registry.load();
        (registry, report)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.models.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.load().is_empty()
    }

    /// Scan the directory and publish the merged map.
    ///
    /// Never fails as a whole: unreadable artifacts are skipped and reported.
    pub fn load(&self) -> ScanReport {
        let current = self.models.load_full();
        let mut report = ScanReport {
            entries_before: current.len(),
            entries_after: current.len(),
            ..ScanReport::default()
        };

        let paths = match self.artifact_paths() {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "model directory not readable");
                return report;
            }
        };

        let mut next: ModelMap = (*current).clone();
        for path in paths {
            match load_artifact(&path) {
                Ok(entry) => {
                    tracing::info!(
                        version = %entry.version,
                        path = %path.display(),
                        loaded_at = %entry.loaded_at,
                        "model loaded"
                    );
                    report.loaded.push(entry.version.clone());
                    next.insert(entry.version.clone(), Arc::new(entry));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping model artifact");
                    report.skipped.push(SkippedArtifact {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.entries_after = next.len();
        self.models.store(Arc::new(next));
        report
    }

    /// Re-scan; `true` when the entry count increased.
    pub fn refresh(&self) -> bool {
        self.load().grew()
    }

    /// Resolve `version`, or the latest entry when `None`.
    ///
    /// A miss is `None`, never an error.
    pub fn get_model(&self, version: Option<&str>) -> Option<Arc<ModelEntry>> {
        let models = self.models.load();
        match version {
            Some(v) => models.get(v).cloned(),
            None => latest(&models).cloned(),
        }
    }

    /// Like `get_model`, but a miss becomes `MlServeError::NotFound`.
    pub fn resolve(&self, version: Option<&str>) -> Result<Arc<ModelEntry>> {
        self.get_model(version).ok_or_else(|| match version {
            Some(v) => MlServeError::NotFound(format!("model version {v}")),
            None => MlServeError::NotFound("no models loaded".into()),
        })
    }

    pub fn get_latest(&self) -> Option<ModelInfo> {
        latest(&self.models.load()).map(|e| e.info())
    }

    /// Every entry, sorted by version.
    pub fn list_available(&self) -> Vec<ModelInfo> {
        let mut infos: Vec<ModelInfo> = self.models.load().values().map(|e| e.info()).collect();
        infos.sort_by(|a, b| a.version.cmp(&b.version));
        infos
    }

    /// Shared handles to every entry, sorted by version.
    pub fn entries(&self) -> Vec<Arc<ModelEntry>> {
        let mut entries: Vec<Arc<ModelEntry>> = self.models.load().values().cloned().collect();
        entries.sort_by(|a, b| a.version.cmp(&b.version));
        entries
    }

    fn artifact_paths(&self) -> std::io::Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            tracing::info!(dir = %self.dir.display(), "model directory missing, creating it");
            fs::create_dir_all(&self.dir)?;
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
                paths.push(path);
            }
        }
        // Stable order: when two artifacts claim one version, the later path wins.
        paths.sort();
        Ok(paths)
    }
}

/// Max `loaded_at`, ties broken by the greater version string.
fn latest(models: &ModelMap) -> Option<&Arc<ModelEntry>> {
    models.values().max_by(|a, b| {
        a.loaded_at
            .cmp(&b.loaded_at)
            .then_with(|| a.version.cmp(&b.version))
    })
}

fn load_artifact(path: &Path) -> Result<ModelEntry> {
    let bytes = fs::read(path).map_err(|e| MlServeError::load(path, e))?;
    let handle = ModelDocument::from_slice(&bytes)
        .and_then(ModelDocument::into_predictor)
        .map_err(|e| MlServeError::load(path, e))?;

    // defaults are synthesized only when there is no metadata file at all
    let meta_path = path.with_extension(METADATA_EXTENSION);
    let (version, loaded_at, features) = if meta_path.exists() {
        let raw = fs::read(&meta_path).map_err(|e| MlServeError::load(&meta_path, e))?;
        let meta = ArtifactMetadata::from_slice(&raw).map_err(|e| MlServeError::load(&meta_path, e))?;
        let loaded_at = meta.loaded_at().map_err(|e| MlServeError::load(&meta_path, e))?;
        (meta.version, loaded_at, meta.features)
    } else {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MlServeError::load(path, "artifact has no file stem"))?;
        (stem, Utc::now(), Vec::new())
    };

    Ok(ModelEntry {
        version,
        loaded_at,
        features,
        artifact_path: path.to_path_buf(),
        artifact_bytes: bytes.len() as u64,
        handle,
    })
}
