#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use mlserve_gateway::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
server:
  listen: "0.0.0.0:8080"
registry:
  modelz_dir: "/tmp/models" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "0.0.0.0:8080");
    assert_eq!(cfg.registry.models_dir.to_str(), Some("/app/models"));
    assert_eq!(cfg.registry.refresh_interval_ms, 0);
    assert_eq!(cfg.metrics.namespace, "mlops");
    assert_eq!(cfg.metrics.subsystem, "inference");
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn range_checks() {
    let cases = [
        "version: 1\nserver: { listen: \"not-an-addr\" }\n",
        "version: 1\nregistry: { refresh_interval_ms: 10 }\n",
        "version: 1\nmetrics: { namespace: \"Bad-Name\" }\n",
        "version: 1\nmetrics: { subsystem: \"\" }\n",
        "version: 1\nmetrics: { resource_sample_interval_ms: 5 }\n",
    ];
    for case in cases {
        let err = config::load_from_str(case).expect_err(case);
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST", "{case}");
    }
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
server:
  listen: "127.0.0.1:9000"
registry:
  models_dir: "/srv/models"
  refresh_interval_ms: 30000
metrics:
  namespace: "acme"
  subsystem: "scoring"
  resource_sample_interval_ms: 0
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.registry.refresh_interval_ms, 30000);
    assert_eq!(cfg.metrics.resource_sample_interval_ms, 0);
}
