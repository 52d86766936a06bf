use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::parse_document;
use crate::state::AppState;

const UPLOAD_FIELDS: [&str; 2] = ["files", "file"];

/// Ingests every uploaded file. All files are decoded before anything is
/// written, so one bad file fails the whole upload.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.body_text()))?
    {
        let is_upload = field
            .name()
            .map(|name| UPLOAD_FIELDS.contains(&name))
            .unwrap_or(false);
        if !is_upload {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(err.body_text()))?;
        documents.push(parse_document(&filename, &bytes)?);
    }

    if documents.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    let report = state.knowledge_base.ingest(documents).await?;
    Ok(Json(json!({
        "message": format!(
            "Successfully ingested {} chunks from {} files.",
            report.chunks, report.files
        ),
        "chunks": report.chunks,
        "files": report.files,
    })))
}

pub async fn clear_kb(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.knowledge_base.clear().await?;
    Ok(Json(json!({"message": "Knowledge Base Cleared"})))
}

pub async fn kb_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.knowledge_base.status().await?))
}
