use crate::coordinator::PredictOutcome;
use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictPayload {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub is_italian: bool,
}

/// Classify one text. 503 while the model is being (re)built.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictPayload>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    if payload.text.trim().is_empty() {
        return Err(ApiError::InvalidPayload("text must not be empty".to_string()));
    }

    match state.coordinator.predict(&payload.text).await? {
        PredictOutcome::Ready(is_italian) => {
            let response = PredictResponse { is_italian };
            info!("[API] {:?} -> {:?}", payload, response);
            Ok(Json(response))
        }
        PredictOutcome::RetryLater => Err(ApiError::Unavailable),
    }
}
