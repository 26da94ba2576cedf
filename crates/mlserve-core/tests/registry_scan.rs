//! Directory scan, latest resolution and refresh semantics.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use mlserve_core::{ClientCode, ModelRegistry};

const LINEAR: &str = r#"{"kind": "linear", "weights": {"x": 2.0}, "intercept": 1.0}"#;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

fn meta(version: &str, loaded_at: &str) -> String {
    json!({"version": version, "loaded_at": loaded_at, "features": ["x"]}).to_string()
}

#[test]
fn valid_and_corrupt_artifacts_are_isolated() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.model", LINEAR);
    write(tmp.path(), "b.model", LINEAR);
    write(tmp.path(), "c.model", LINEAR);
    write(tmp.path(), "broken.model", "{not json");
    write(tmp.path(), "unknown_kind.model", r#"{"kind": "forest"}"#);
    write(tmp.path(), "bad_meta.model", LINEAR);
    write(tmp.path(), "bad_meta.meta", "[1, 2");
    write(tmp.path(), "README.txt", "ignored");

    let (registry, report) = ModelRegistry::open(tmp.path());

    assert_eq!(report.loaded.len(), 3);
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(registry.len(), 3);
    assert!(report.grew());
    assert!(report.skipped.iter().any(|s| s.path.ends_with("broken.model")));
}

#[test]
fn missing_directory_is_created_empty() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("models");

    let (registry, report) = ModelRegistry::open(&dir);

    assert!(dir.is_dir());
    assert!(registry.is_empty());
    assert!(report.loaded.is_empty() && report.skipped.is_empty());
    assert!(registry.get_model(None).is_none());
    assert!(registry.get_latest().is_none());

    let err = registry.resolve(None).expect_err("empty registry must miss");
    assert_eq!(err.client_code(), ClientCode::NotFound);
}

#[test]
fn metadata_version_and_synthesized_version() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "v1.model", LINEAR);
    write(tmp.path(), "v1.meta", &meta("v1", "2024-01-15T10:30:00"));
    write(tmp.path(), "v2.model", LINEAR);

    let before = Utc::now();
    let (registry, _) = ModelRegistry::open(tmp.path());

    let latest = registry.get_model(None).expect("latest");
    assert_eq!(latest.version, "v2");
    assert!(latest.loaded_at >= before);
    assert!(latest.features.is_empty());

    let v1 = registry.get_model(Some("v1")).expect("v1");
    assert_eq!(v1.loaded_at, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    assert_eq!(v1.features, vec!["x".to_string()]);

    assert_eq!(registry.get_latest().unwrap().version, "v2");
}

#[test]
fn missing_version_is_a_miss() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "v1.model", LINEAR);
    let (registry, _) = ModelRegistry::open(tmp.path());

    assert!(registry.get_model(Some("missing-version")).is_none());
    let err = registry.resolve(Some("missing-version")).unwrap_err();
    assert_eq!(err.client_code().as_str(), "NOT_FOUND");
}

#[test]
fn latest_ties_resolve_by_version_string() {
    let tmp = TempDir::new().unwrap();
    for v in ["alpha", "gamma", "beta"] {
        write(tmp.path(), &format!("{v}.model"), LINEAR);
        write(tmp.path(), &format!("{v}.meta"), &meta(v, "2024-03-01T00:00:00Z"));
    }
    let (registry, _) = ModelRegistry::open(tmp.path());

    for _ in 0..5 {
        assert_eq!(registry.get_model(None).unwrap().version, "gamma");
    }
}

#[test]
fn rfc3339_offsets_are_normalized() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "early.model", LINEAR);
    write(tmp.path(), "early.meta", &meta("early", "2024-05-01T12:00:00+02:00"));
    write(tmp.path(), "late.model", LINEAR);
    write(tmp.path(), "late.meta", &meta("late", "2024-05-01T11:00:00Z"));

    let (registry, _) = ModelRegistry::open(tmp.path());
    // 12:00+02:00 is 10:00Z
    assert_eq!(registry.get_model(None).unwrap().version, "late");
}

#[test]
fn invalid_timestamp_skips_artifact() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "v1.model", LINEAR);
    write(tmp.path(), "v1.meta", &meta("v1", "yesterday"));

    let (registry, report) = ModelRegistry::open(tmp.path());
    assert!(registry.is_empty());
    assert_eq!(report.skipped.len(), 1);
}

#[test]
fn incomplete_metadata_skips_artifact() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "undated.model", LINEAR);
    write(tmp.path(), "undated.meta", r#"{"version": "undated", "features": ["x"]}"#);
    write(tmp.path(), "nameless.model", LINEAR);
    write(tmp.path(), "nameless.meta", r#"{"loaded_at": "2024-01-01T00:00:00Z"}"#);
    write(tmp.path(), "v2.model", LINEAR);
    write(tmp.path(), "v2.meta", &meta("v2", "2024-01-01T00:00:00Z"));

    let (registry, report) = ModelRegistry::open(tmp.path());

    assert_eq!(report.loaded, vec!["v2".to_string()]);
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.iter().all(|s| s.reason.contains("missing field")));
    assert!(registry.get_model(Some("undated")).is_none());
    assert!(registry.get_model(Some("nameless")).is_none());
    assert_eq!(registry.get_model(None).unwrap().version, "v2");
}

#[test]
fn list_available_is_a_sorted_copy() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "b.model", LINEAR);
    write(tmp.path(), "a.model", LINEAR);
    write(tmp.path(), "a.meta", &meta("a", "2024-01-01T00:00:00Z"));

    let (registry, _) = ModelRegistry::open(tmp.path());
    let mut listed = registry.list_available();
    assert_eq!(
        listed.iter().map(|m| m.version.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );

    listed.clear();
    assert_eq!(registry.list_available().len(), 2);
}

#[test]
fn refresh_is_additive_and_reports_growth_only() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "v1.model", LINEAR);
    write(tmp.path(), "v1.meta", &meta("v1", "2024-01-01T00:00:00Z"));
    let (registry, _) = ModelRegistry::open(tmp.path());

    // nothing new
    assert!(!registry.refresh());

    // a replacement of v1 does not count as growth
    write(tmp.path(), "v1.meta", &meta("v1", "2024-06-01T00:00:00Z"));
    assert!(!registry.refresh());
    assert_eq!(
        registry.get_model(Some("v1")).unwrap().loaded_at,
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    );

    write(tmp.path(), "v2.model", LINEAR);
    assert!(registry.refresh());
    assert_eq!(registry.len(), 2);

    // deleted artifacts stay registered
    fs::remove_file(tmp.path().join("v1.model")).unwrap();
    let report = registry.load();
    assert!(!report.grew());
    assert!(registry.get_model(Some("v1")).is_some());
}

#[test]
fn same_version_in_two_artifacts_last_path_wins() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.model", r#"{"kind": "linear", "weights": {"x": 1.0}}"#);
    write(tmp.path(), "a.meta", &meta("shared", "2024-01-01T00:00:00Z"));
    write(tmp.path(), "b.model", r#"{"kind": "linear", "weights": {"y": 1.0}}"#);
    write(tmp.path(), "b.meta", &meta("shared", "2024-01-02T00:00:00Z"));

    let (registry, report) = ModelRegistry::open(tmp.path());
    assert_eq!(report.loaded, vec!["shared".to_string(), "shared".to_string()]);
    assert_eq!(registry.len(), 1);

    let entry = registry.get_model(Some("shared")).unwrap();
    assert!(entry.artifact_path.ends_with("b.model"));
    assert_eq!(entry.predictor().inputs(), &["y".to_string()]);
}

#[test]
fn readers_keep_their_snapshot_across_refresh() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "v1.model", LINEAR);
    let (registry, _) = ModelRegistry::open(tmp.path());

    let held = registry.get_model(Some("v1")).unwrap();
    write(tmp.path(), "v1.model", r#"{"kind": "linear", "weights": {"z": 3.0}}"#);
    registry.refresh();

    assert_eq!(held.predictor().inputs(), &["x".to_string()]);
    assert_eq!(
        registry.get_model(Some("v1")).unwrap().predictor().inputs(),
        &["z".to_string()]
    );
    assert!(held.artifact_bytes > 0);
}
