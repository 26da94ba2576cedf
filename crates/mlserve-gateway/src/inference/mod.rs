//! Inference endpoint: request/response types, the predict handler, and the
//! mapping from `MlServeError` to HTTP responses.

pub mod error;
pub mod handler;

pub use error::ApiError;
pub use handler::{predict, PredictionRequest, PredictionResponse};
