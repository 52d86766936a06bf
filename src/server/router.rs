use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::ServerSettings;
use crate::core::errors::ApiError;
use crate::server::handlers::{config, generate, health, kb};
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
///
/// This function sets up:
/// - Status endpoints
/// - Knowledge-base upload, clear and status
/// - Test-case and script generation
/// - Config read and update
/// - CORS, upload size limit and request tracing
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server);
    let body_limit = DefaultBodyLimit::max(state.settings.server.max_upload_bytes);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/upload", post(kb::upload))
        .route("/clear-kb", post(kb::clear_kb))
        .route("/api/kb/status", get(kb::kb_status))
        .route("/generate-test-cases", post(generate::generate_test_cases))
        .route("/generate-script", post(generate::generate_script))
        .route(
            "/api/config",
            get(config::get_config)
                .post(config::update_config)
                .patch(config::patch_config),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(body_limit)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

fn build_cors_layer(server: &ServerSettings) -> CorsLayer {
    let allowed_origins = resolve_allowed_origins(server)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn resolve_allowed_origins(server: &ServerSettings) -> Vec<String> {
    let origins = server
        .cors_allowed_origins
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }

    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:8501".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8501".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_origins_replace_defaults() {
        let server = ServerSettings {
            cors_allowed_origins: vec![" http://qa.local:8501 ".to_string(), "".to_string()],
            ..ServerSettings::default()
        };
        assert_eq!(resolve_allowed_origins(&server), vec!["http://qa.local:8501"]);
    }

    #[test]
    fn defaults_include_streamlit_port() {
        let origins = resolve_allowed_origins(&ServerSettings::default());
        assert!(origins.contains(&"http://localhost:8501".to_string()));
    }
}
