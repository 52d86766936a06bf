//! Typed view over the merged YAML configuration.
//!
//! `ConfigService` works on raw `serde_json::Value` trees so it can merge,
//! split and redact them; components read their knobs from `AppSettings`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Server root for an OpenAI-compatible API. Clients append `/v1/...`
/// themselves, so a trailing `/v1` (the usual `OPENAI_BASE_URL` form) is
/// dropped.
pub fn api_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
}

impl AppSettings {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        serde_json::from_value(value.clone())
            .map_err(|err| ApiError::BadRequest(format!("Invalid config: {}", err)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// The hosted endpoint needs a key; a self-hosted compatible endpoint
    /// (LM Studio, Ollama, vLLM) is usable without one.
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some() || api_base_url(&self.base_url) != DEFAULT_OPENAI_BASE_URL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingProviderKind {
    #[serde(rename = "hash")]
    Hash,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            dimension: 384,
            batch_size: 64,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub test_case_k: usize,
    pub script_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            test_case_k: 5,
            script_k: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_is_reduced_to_server_root() {
        assert_eq!(api_base_url("http://localhost:1234/v1"), "http://localhost:1234");
        assert_eq!(api_base_url(" https://api.openai.com/v1/ "), DEFAULT_OPENAI_BASE_URL);
        assert_eq!(api_base_url("http://host/proxy/"), "http://host/proxy");
        assert_eq!(api_base_url("http://host/v10"), "http://host/v10");
    }

    #[test]
    fn hosted_default_with_version_suffix_still_needs_a_key() {
        let settings = LlmSettings {
            base_url: "https://api.openai.com/v1".to_string(),
            ..LlmSettings::default()
        };
        assert!(!settings.is_configured());
    }

    #[test]
    fn empty_config_yields_defaults() {
        let settings = AppSettings::from_value(&json!({})).unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.llm.model, "gpt-4o");
        assert_eq!(settings.embedding.provider, EmbeddingProviderKind::Hash);
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.retrieval.test_case_k, 5);
        assert_eq!(settings.retrieval.script_k, 3);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings = AppSettings::from_value(&json!({
            "embedding": { "provider": "openai", "dimension": 1536 },
            "unrelated": { "x": 1 }
        }))
        .unwrap();
        assert_eq!(settings.embedding.provider, EmbeddingProviderKind::OpenAi);
        assert_eq!(settings.embedding.dimension, 1536);
        assert_eq!(settings.embedding.batch_size, 64);
    }

    #[test]
    fn llm_needs_key_only_for_hosted_endpoint() {
        let mut llm = LlmSettings::default();
        assert!(!llm.is_configured());

        llm.api_key = Some("   ".to_string());
        assert!(!llm.is_configured());

        llm.api_key = Some("sk-test".to_string());
        assert!(llm.is_configured());

        let local = LlmSettings {
            base_url: "http://localhost:1234".to_string(),
            ..LlmSettings::default()
        };
        assert!(local.is_configured());
    }
}
