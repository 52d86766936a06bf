pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    api_base_url, AppSettings, ChunkingSettings, EmbeddingProviderKind, EmbeddingSettings, LlmSettings,
    RetrievalSettings, ServerSettings,
};
