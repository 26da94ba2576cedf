use std::path::PathBuf;

use serde::Deserialize;
use mlserve_core::error::{MlServeError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MlServeError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.registry.validate()?;
        self.metrics.validate()?;

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            registry: RegistrySection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen
            .parse::<std::net::SocketAddr>()
            .map_err(|_| MlServeError::BadRequest("server.listen must be a valid SocketAddr".into()))?;
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// 0 disables the periodic refresh.
    #[serde(default)]
    pub refresh_interval_ms: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            refresh_interval_ms: 0,
        }
    }
}

impl RegistrySection {
    pub fn validate(&self) -> Result<()> {
        if self.models_dir.as_os_str().is_empty() {
            return Err(MlServeError::BadRequest("registry.models_dir must not be empty".into()));
        }
        if self.refresh_interval_ms != 0 && self.refresh_interval_ms < 1000 {
            return Err(MlServeError::BadRequest(
                "registry.refresh_interval_ms must be 0 or at least 1000".into(),
            ));
        }
        Ok(())
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("/app/models")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_subsystem")]
    pub subsystem: String,

    /// 0 disables the resource sampler.
    #[serde(default = "default_resource_sample_interval_ms")]
    pub resource_sample_interval_ms: u64,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            subsystem: default_subsystem(),
            resource_sample_interval_ms: default_resource_sample_interval_ms(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("namespace", &self.namespace), ("subsystem", &self.subsystem)] {
            let ok = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !ok {
                return Err(MlServeError::BadRequest(format!(
                    "metrics.{field} must be non-empty [a-z0-9_]"
                )));
            }
        }
        if self.resource_sample_interval_ms != 0 && self.resource_sample_interval_ms < 1000 {
            return Err(MlServeError::BadRequest(
                "metrics.resource_sample_interval_ms must be 0 or at least 1000".into(),
            ));
        }
        Ok(())
    }
}

fn default_namespace() -> String {
    "mlops".into()
}
fn default_subsystem() -> String {
    "inference".into()
}
fn default_resource_sample_interval_ms() -> u64 {
    15000
}
