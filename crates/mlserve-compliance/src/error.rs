//! Compliance errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComplianceError>;

#[derive(Debug, Clone, Error)]
pub enum ComplianceError {
    /// A configuration query failed (permission denied, throttling, unknown bucket...).
    #[error("{code}: {message}")]
    Query { code: String, message: String },
    /// The queried configuration is not set on the bucket. Carries the backend code.
    #[error("configuration not found: {0}")]
    ConfigNotFound(String),
    /// A corrective write failed.
    #[error("remediation failed: {0}")]
    Remediation(String),
    /// The backend itself could not be set up or persisted.
    #[error("backend: {0}")]
    Backend(String),
}

impl ComplianceError {
    pub fn query(code: impl Into<String>, message: impl Into<String>) -> Self {
        ComplianceError::Query {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ComplianceError::ConfigNotFound(_))
    }
}
