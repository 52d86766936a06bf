use std::sync::Arc;

use crate::core::config::{AppSettings, ConfigService};
use crate::llm::LlmService;
use crate::qa::QaService;
use crate::rag::{embedder, reconcile_embedding_model, Chunker, KnowledgeBase, SqliteRagStore};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// `settings` is the configuration snapshot taken at startup; only the LLM
/// client is rebuilt when the config is updated at runtime.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigService,
    pub settings: AppSettings,
    pub knowledge_base: Arc<KnowledgeBase>,
    pub llm: LlmService,
    pub qa: QaService,
}

impl AppState {
    /// Initializes the application state from `config`.
    ///
    /// This process includes:
    /// 1. Loading and validating configuration
    /// 2. Opening the RAG index and reconciling it with the active embedder
    /// 3. Setting up the LLM client (left unconfigured without credentials)
    pub async fn initialize(config: ConfigService) -> Result<Arc<Self>, InitializationError> {
        let paths = config.paths();
        let settings = config
            .settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let chunker = Chunker::from_settings(&settings.chunking)
            .map_err(|e| InitializationError::Config(e.into()))?;
        let embedder = embedder::from_settings(&settings.embedding)
            .map_err(|e| InitializationError::Embedder(e.into()))?;

        let store = SqliteRagStore::open(&paths.index_dir)
            .await
            .map_err(|e| InitializationError::Rag(e.into()))?;
        reconcile_embedding_model(&store, &embedder.model_key())
            .await
            .map_err(|e| InitializationError::Rag(e.into()))?;

        let knowledge_base = Arc::new(KnowledgeBase::new(Arc::new(store), embedder, chunker));

        let llm = LlmService::new(&settings.llm).map_err(|e| InitializationError::Llm(e.into()))?;
        let qa = QaService::new(knowledge_base.clone(), llm.clone(), settings.retrieval.clone());

        tracing::info!(
            embedder = %knowledge_base.embedder().model_key(),
            index = %paths.index_dir.display(),
            "Application state initialized"
        );

        Ok(Arc::new(AppState {
            config,
            settings,
            knowledge_base,
            llm,
            qa,
        }))
    }
}
