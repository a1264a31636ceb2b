use std::sync::Arc;

use crate::chat::AnswerStreamer;
use crate::core::config::{AppPaths, ConfigService, LlmSettings, RetrievalSettings};
use crate::llm::{GeminiProvider, LlmProvider};
use crate::rag::{PassageStore, Retriever, SqlitePassageStore};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains references to:
/// - Configuration and paths
/// - The passage store
/// - The upstream LLM provider and the retrieval/streaming services
///   built on it
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub provider: Arc<dyn LlmProvider>,
    pub store: Arc<dyn PassageStore>,
    pub retriever: Arc<Retriever>,
    pub streamer: Arc<AnswerStreamer>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Setting up paths and loading configuration
    /// 2. Opening the passage database
    /// 3. Wiring the LLM provider into the retriever and streamer
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config_service = ConfigService::new(paths.clone());
        let config = config_service
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let store: Arc<dyn PassageStore> = Arc::new(
            SqlitePassageStore::new(paths.as_ref())
                .await
                .map_err(|e| InitializationError::Store(e.into()))?,
        );

        let llm_settings = LlmSettings::from_config(&config);
        let retrieval_settings = RetrievalSettings::from_config(&config);

        if llm_settings.api_key.is_none() {
            tracing::warn!("No API key configured; upstream requests will fail");
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(
            llm_settings.base_url.clone(),
            llm_settings.api_key.clone(),
        ));

        let retriever = Arc::new(Retriever::new(
            provider.clone(),
            store.clone(),
            retrieval_settings,
            llm_settings.embedding_model.clone(),
        ));
        let streamer = Arc::new(AnswerStreamer::new(provider.clone(), llm_settings));

        Ok(Arc::new(AppState {
            paths,
            config: config_service,
            provider,
            store,
            retriever,
            streamer,
        }))
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
