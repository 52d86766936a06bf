//! Text embedding providers.
//!
//! - `OpenAiEmbedder`: any OpenAI-compatible `/v1/embeddings` endpoint
//!   (OpenAI, LM Studio, Ollama, vLLM).
//! - `HashEmbedder`: deterministic token hashing, no network. The default, so
//!   a fresh install can build a knowledge base offline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::core::config::{api_base_url, EmbeddingProviderKind, EmbeddingSettings};
use crate::core::errors::ApiError;
use crate::vector_math::l2_normalize;

const CONCURRENT_BATCHES: usize = 4;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Identifies the vector space. Vectors from different keys are not
    /// comparable, so a change of key invalidates the index.
    fn model_key(&self) -> String;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Upstream("Embedder returned no vector".to_string()))
    }
}

pub fn from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>, ApiError> {
    match settings.provider {
        EmbeddingProviderKind::Hash => Ok(Arc::new(HashEmbedder::new(settings.dimension))),
        EmbeddingProviderKind::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(settings)?)),
    }
}

pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();

        for token in lower.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn model_key(&self) -> String {
        format!("hash:{}", self.dimension)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    client: Client,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        Ok(Self {
            base_url: api_base_url(&settings.base_url),
            model: settings.model.clone(),
            api_key,
            batch_size: settings.batch_size.max(1),
            client,
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": batch,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(ApiError::upstream)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Embedding request failed ({}): {}",
                status, text
            )));
        }

        let mut payload: EmbeddingsResponse = res.json().await.map_err(ApiError::upstream)?;
        if payload.data.len() != batch.len() {
            return Err(ApiError::Upstream(format!(
                "Embedding endpoint returned {} vectors for {} inputs",
                payload.data.len(),
                batch.len()
            )));
        }

        payload.data.sort_by_key(|item| item.index);
        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_key(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(
            texts
                .chunks(self.batch_size)
                .map(|batch| self.embed_batch(batch))
                .collect::<Vec<_>>(),
        )
        .buffered(CONCURRENT_BATCHES)
        .try_collect()
        .await?;

        tracing::debug!(
            inputs = texts.len(),
            batches = batches.len(),
            "Embedded documents"
        );
        Ok(batches.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    use super::*;
    use crate::vector_math::cosine_similarity;

    #[derive(Clone, Default)]
    struct Captured {
        batch_sizes: Arc<Mutex<Vec<usize>>>,
        auth: Arc<Mutex<Option<String>>>,
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn openai_settings(base_url: String, batch_size: usize) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: EmbeddingProviderKind::OpenAi,
            base_url,
            api_key: Some("sk-emb".to_string()),
            batch_size,
            ..EmbeddingSettings::default()
        }
    }

    /// Embeds `"t<n>"` as `[n]` and lists the results in reverse index order.
    async fn reversed_embeddings(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let inputs: Vec<String> = serde_json::from_value(body["input"].clone()).unwrap();
        assert_eq!(body["model"], "text-embedding-3-small");
        captured.batch_sizes.lock().unwrap().push(inputs.len());
        *captured.auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(index, text)| {
                let n: f32 = text.trim_start_matches('t').parse().unwrap();
                json!({"object": "embedding", "index": index, "embedding": [n]})
            })
            .collect();
        Json(json!({"object": "list", "data": data}))
    }

    #[tokio::test]
    async fn openai_batches_requests_and_restores_input_order() {
        let captured = Captured::default();
        let router = Router::new()
            .route("/v1/embeddings", post(reversed_embeddings))
            .with_state(captured.clone());
        let base_url = spawn_stub(router).await;

        let embedder = OpenAiEmbedder::new(&openai_settings(base_url, 2)).unwrap();
        let texts: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
        let vectors = embedder.embed_documents(&texts).await.unwrap();

        assert_eq!(
            vectors,
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]]
        );
        let mut sizes = captured.batch_sizes.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2, 2]);
        assert_eq!(
            captured.auth.lock().unwrap().as_deref(),
            Some("Bearer sk-emb")
        );
    }

    #[tokio::test]
    async fn openai_error_status_keeps_response_body() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded") }),
        );
        let base_url = spawn_stub(router).await;

        let embedder = OpenAiEmbedder::new(&openai_settings(base_url, 8)).unwrap();
        let err = embedder.embed_query("t0").await.unwrap_err();
        assert!(
            matches!(err, ApiError::Upstream(msg) if msg.contains("500") && msg.contains("model overloaded"))
        );
    }

    #[tokio::test]
    async fn openai_short_response_is_rejected() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|| async { Json(json!({"data": [{"index": 0, "embedding": [1.0]}]})) }),
        );
        let base_url = spawn_stub(router).await;

        let embedder = OpenAiEmbedder::new(&openai_settings(format!("{}/v1", base_url), 8)).unwrap();
        let err = embedder
            .embed_documents(&["t0".to_string(), "t1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(msg) if msg.contains("1 vectors for 2 inputs")));
    }

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_query("Apply discount code SAVE15").await.unwrap();
        let b = embedder.embed_query("apply DISCOUNT code save15").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn hash_embeddings_rank_shared_vocabulary_higher() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed_query("discount code").await.unwrap();
        let docs = embedder
            .embed_documents(&[
                "The discount code SAVE15 gives 15% off".to_string(),
                "Shipping is free for express delivery".to_string(),
            ])
            .await
            .unwrap();

        assert!(cosine_similarity(&query, &docs[0]) > cosine_similarity(&query, &docs[1]));
    }

    #[tokio::test]
    async fn blank_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let vector = embedder.embed_query("  ...  ").await.unwrap();
        assert!(vector.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn model_keys_identify_provider_and_model() {
        assert_eq!(HashEmbedder::new(384).model_key(), "hash:384");

        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::OpenAi,
            base_url: "http://localhost:1234/".to_string(),
            ..EmbeddingSettings::default()
        };
        let embedder = from_settings(&settings).unwrap();
        assert_eq!(embedder.name(), "openai");
        assert_eq!(embedder.model_key(), "openai:text-embedding-3-small");
    }
}
