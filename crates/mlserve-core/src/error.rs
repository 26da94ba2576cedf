//! Shared error type across mlserve crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Requested model version is absent, or nothing is loaded.
    NotFound,
    /// Invalid input / malformed features.
    BadRequest,
    /// Unsupported config or artifact version.
    UnsupportedVersion,
    /// Internal server error (including a failed prediction call).
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MlServeError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum MlServeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    /// One artifact failed to load. Never fatal for a scan.
    #[error("failed to load {path}: {reason}")]
    LoadFailure { path: String, reason: String },
    /// A model document or metadata file is malformed.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),
    /// The model call itself failed.
    #[error("prediction failed: {0}")]
    Prediction(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl MlServeError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MlServeError::NotFound(_) => ClientCode::NotFound,
            MlServeError::BadRequest(_) => ClientCode::BadRequest,
            MlServeError::LoadFailure { .. } => ClientCode::Internal,
            MlServeError::InvalidArtifact(_) => ClientCode::Internal,
            MlServeError::Prediction(_) => ClientCode::Internal,
            MlServeError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            MlServeError::Internal(_) => ClientCode::Internal,
        }
    }

    pub(crate) fn load(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        MlServeError::LoadFailure {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
