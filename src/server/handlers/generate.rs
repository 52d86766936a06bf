use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::qa::{ScriptRequest, TestCaseRequest};
use crate::state::AppState;

pub async fn generate_test_cases(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TestCaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let response = state.qa.generate_test_cases(&request.query, request.k).await?;
    Ok(Json(response))
}

pub async fn generate_script(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScriptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let response = state.qa.generate_script(request).await?;
    Ok(Json(response))
}
