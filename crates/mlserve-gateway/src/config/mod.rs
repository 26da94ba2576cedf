//! Service config loader (strict parsing).

pub mod schema;

use std::fs;

use mlserve_core::error::{MlServeError, Result};

pub use schema::{MetricsSection, RegistrySection, ServerSection, ServiceConfig};

/// Default config path; overridden by `MLSERVE_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "mlserve.yaml";

pub fn load_from_file(path: &str) -> Result<ServiceConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MlServeError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServiceConfig> {
    let cfg: ServiceConfig = serde_yaml::from_str(s)
        .map_err(|e| MlServeError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
