//! HTTP mapping of `MlServeError` (the only place status codes are chosen).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use mlserve_core::{ClientCode, MlServeError};

#[derive(Debug)]
pub struct ApiError(pub MlServeError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.client_code() {
            ClientCode::NotFound => StatusCode::NOT_FOUND,
            ClientCode::BadRequest | ClientCode::UnsupportedVersion => StatusCode::BAD_REQUEST,
            ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MlServeError> for ApiError {
    fn from(e: MlServeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.0.client_code().as_str(),
            "detail": self.0.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
