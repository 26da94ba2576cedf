//! Model documents, preprocessing and prediction shapes.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::json;

use mlserve_core::model::artifact::{parse_timestamp, ModelDocument};
use mlserve_core::{Capability, ClientCode, FeatureMap, FeatureRow, Prediction, Predictor};

fn predictor(doc: serde_json::Value) -> Box<dyn Predictor> {
    ModelDocument::from_slice(doc.to_string().as_bytes())
        .and_then(ModelDocument::into_predictor)
        .expect("valid model document")
}

fn features(v: serde_json::Value) -> FeatureMap {
    v.as_object().cloned().unwrap()
}

fn run(p: &dyn Predictor, f: serde_json::Value) -> mlserve_core::Result<Prediction> {
    let row = FeatureRow::from_features(p.inputs(), &features(f))?;
    p.predict(&row)
}

#[test]
fn linear_point_prediction() {
    let p = predictor(json!({"kind": "linear", "weights": {"a": 2.0, "b": -1.0}, "intercept": 0.5}));
    assert_eq!(p.capability(), Capability::Point);
    assert_eq!(p.inputs(), &["a".to_string(), "b".to_string()]);

    let out = run(p.as_ref(), json!({"a": 3, "b": 1.5, "note": "category_a"})).unwrap();
    assert_eq!(out, Prediction::Point { value: 5.0 });
    assert_eq!(out.confidence(), None);
}

#[test]
fn logistic_reports_probabilities() {
    let p = predictor(json!({
        "kind": "logistic",
        "weights": {"x": 1.0},
        "classes": ["no", "yes"]
    }));
    assert_eq!(p.capability(), Capability::Probabilistic);

    match run(p.as_ref(), json!({"x": 0.0})).unwrap() {
        Prediction::Probabilistic { label, classes, probabilities } => {
            assert_eq!(label, "yes"); // p = 0.5 meets the default threshold
            assert_eq!(classes, vec!["no", "yes"]);
            assert!((probabilities[0] - 0.5).abs() < 1e-12);
            assert!((probabilities[1] - 0.5).abs() < 1e-12);
        }
        other => panic!("unexpected {other:?}"),
    }

    let strong = run(p.as_ref(), json!({"x": -6.0})).unwrap();
    match &strong {
        Prediction::Probabilistic { label, .. } => assert_eq!(label, "no"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(strong.confidence().unwrap() > 0.99);
}

#[test]
fn softmax_picks_highest_score() {
    let p = predictor(json!({
        "kind": "softmax",
        "classes": ["cat", "dog", "bird"],
        "weights": {"cat": {"whiskers": 3.0}, "dog": {"bark": 3.0}},
        "intercepts": {"bird": 0.1}
    }));
    assert_eq!(p.inputs(), &["bark".to_string(), "whiskers".to_string()]);

    let out = run(p.as_ref(), json!({"whiskers": 1, "bark": 0})).unwrap();
    match &out {
        Prediction::Probabilistic { label, probabilities, .. } => {
            assert_eq!(label, "cat");
            let total: f64 = probabilities.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn softmax_handles_large_scores() {
    let p = predictor(json!({
        "kind": "softmax",
        "classes": ["a", "b"],
        "weights": {"a": {"x": 1.0}, "b": {"x": -1.0}}
    }));
    let out = run(p.as_ref(), json!({"x": 500.0})).unwrap();
    assert!((out.confidence().unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn bad_inputs_are_client_errors() {
    let p = predictor(json!({"kind": "linear", "weights": {"age": 1.0}}));

    let missing = run(p.as_ref(), json!({"height": 1})).unwrap_err();
    assert_eq!(missing.client_code(), ClientCode::BadRequest);

    let text = run(p.as_ref(), json!({"age": "forty"})).unwrap_err();
    assert_eq!(text.client_code(), ClientCode::BadRequest);

    let null = run(p.as_ref(), json!({"age": null})).unwrap_err();
    assert_eq!(null.client_code(), ClientCode::BadRequest);

    let flag = run(p.as_ref(), json!({"age": true})).unwrap();
    assert_eq!(flag, Prediction::Point { value: 1.0 });
}

#[test]
fn overflowing_score_is_a_prediction_failure() {
    let p = predictor(json!({"kind": "linear", "weights": {"x": 1e308}}));
    let err = run(p.as_ref(), json!({"x": 1e308})).unwrap_err();
    assert_eq!(err.client_code(), ClientCode::Internal);
    assert!(err.to_string().starts_with("prediction failed"));
}

#[test]
fn invalid_documents_are_rejected() {
    let cases = [
        json!({"kind": "logistic", "weights": {}, "classes": ["a", "a"]}),
        json!({"kind": "logistic", "weights": {}, "classes": ["a", "b"], "threshold": 1.5}),
        json!({"kind": "softmax", "classes": ["only"], "weights": {}}),
        json!({"kind": "softmax", "classes": ["a", "b"], "weights": {"c": {"x": 1.0}}}),
        json!({"kind": "linear"}),
    ];
    for doc in cases {
        let res = ModelDocument::from_slice(doc.to_string().as_bytes())
            .and_then(ModelDocument::into_predictor);
        let err = res.expect_err("invalid document accepted");
        assert_eq!(err.client_code(), ClientCode::Internal, "{doc}");
    }
}

#[test]
fn timestamps_accept_naive_and_rfc3339() {
    let naive = parse_timestamp("2024-01-15T10:30:00.123456").unwrap();
    let zoned = parse_timestamp("2024-01-15T10:30:00.123456Z").unwrap();
    assert_eq!(naive, zoned);
    assert!(parse_timestamp("2024-01-15 10:30:00").is_ok());
    let err = parse_timestamp("15/01/2024").unwrap_err();
    assert_eq!(err.client_code(), ClientCode::Internal);
}
