use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn get_config(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let config = state.config.load_config()?;
    Ok(Json(state.config.redact_sensitive_values(&config)))
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    apply_config(&state, payload, false).await
}

pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    apply_config(&state, payload, true).await
}

/// Persists the new config and swaps in an LLM client built from it. Other
/// sections take effect on restart.
async fn apply_config(
    state: &AppState,
    payload: Value,
    merge: bool,
) -> Result<Json<Value>, ApiError> {
    state.config.update_config(payload, merge)?;
    let settings = state.config.settings()?;
    state.llm.reload(&settings.llm).await?;

    Ok(Json(json!({
        "status": "success",
        "llm_configured": state.llm.is_configured().await,
    })))
}
