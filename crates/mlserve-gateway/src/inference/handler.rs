//! `POST /predict`.
//!
//! Flow: decode body -> resolve model -> preprocess features -> predict.
//! Every outcome, success or failure, is handed to the metrics pipeline;
//! recording happens off the response path.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mlserve_core::error::{MlServeError, Result};
use mlserve_core::{ClientCode, FeatureMap, MetricEvent, Prediction};

use crate::app_state::AppState;
use crate::inference::error::ApiError;

/// Error type recorded when the request body cannot be decoded.
pub const INVALID_REQUEST: &str = "invalid_request";

const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictionRequest {
    pub features: FeatureMap,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub prediction: Prediction,
    pub model_version: String,
    pub inference_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Version label of a failed attempt: the resolved version when resolution
/// succeeded, else the requested one, else `unknown`.
struct Failure {
    version: Option<String>,
    error: MlServeError,
}

pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictionRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictionResponse>, ApiError> {
    let started = Instant::now();

    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            state.pipeline().record_error(INVALID_REQUEST, UNKNOWN_VERSION);
            tracing::warn!(error = %rejection.body_text(), "rejected prediction request");
            return Err(MlServeError::BadRequest(rejection.body_text()).into());
        }
    };

    match run(&state, &req) {
        Ok((version, prediction)) => {
            let inference_time_ms = started.elapsed().as_secs_f64() * 1000.0;
            state.pipeline().record_prediction(MetricEvent {
                success: true,
                inference_time_ms,
                model_version: version.clone(),
                confidence: prediction.confidence(),
            });
            tracing::info!(version = %version, inference_time_ms, "prediction served");

            Ok(Json(PredictionResponse {
                prediction,
                model_version: version,
                inference_time_ms,
                timestamp: Utc::now(),
            }))
        }
        Err(Failure { version, error }) => {
            let label = version
                .or_else(|| req.model_version.clone())
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
            state.pipeline().record_prediction(MetricEvent {
                success: false,
                inference_time_ms: 0.0,
                model_version: label.clone(),
                confidence: None,
            });

            match error.client_code() {
                ClientCode::Internal => tracing::error!(version = %label, error = %error, "prediction failed"),
                _ => tracing::warn!(version = %label, error = %error, "prediction rejected"),
            }
            Err(error.into())
        }
    }
}

fn run(state: &AppState, req: &PredictionRequest) -> std::result::Result<(String, Prediction), Failure> {
    let entry = state
        .registry()
        .resolve(req.model_version.as_deref())
        .map_err(|error| Failure { version: None, error })?;

    let attempt = || -> Result<Prediction> {
        let row = entry.prepare(&req.features)?;
        for (feature, value) in row.iter() {
            state.pipeline().record_data_drift(feature, value);
        }
        entry.predict(&row)
    };

    attempt()
        .map(|p| (entry.version.clone(), p))
        .map_err(|error| Failure { version: Some(entry.version.clone()), error })
}
