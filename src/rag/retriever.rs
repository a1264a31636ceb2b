//! Retrieval orchestration: embed the query, search the vector index,
//! fall back to regex text matching when the vector path finds nothing.

use std::sync::Arc;

use crate::core::config::RetrievalSettings;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

use super::passage::ScoredPassage;
use super::store::PassageStore;

/// Outcome of a retrieval attempt. Vector and fallback results are
/// mutually exclusive; the fallback never runs when vector search
/// produced at least one row.
#[derive(Debug)]
pub enum RetrievalResult {
    Vector(Vec<ScoredPassage>),
    Fallback(Vec<ScoredPassage>),
    Empty,
}

impl RetrievalResult {
    pub fn passages(&self) -> &[ScoredPassage] {
        match self {
            RetrievalResult::Vector(p) | RetrievalResult::Fallback(p) => p,
            RetrievalResult::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RetrievalResult::Empty)
    }
}

pub struct Retriever {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn PassageStore>,
    settings: RetrievalSettings,
    embedding_model: String,
    fallback_pattern: String,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn PassageStore>,
        settings: RetrievalSettings,
        embedding_model: String,
    ) -> Self {
        let fallback_pattern = settings.fallback_patterns.join("|");
        Self {
            provider,
            store,
            settings,
            embedding_model,
            fallback_pattern,
        }
    }

    /// Embed the query and rank passages against it. Provider errors
    /// (rate limits included) propagate before the store is touched.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult, ApiError> {
        let embeddings = self
            .provider
            .embed(&[query.to_string()], &self.embedding_model)
            .await?;

        let query_embedding = embeddings
            .into_iter()
            .find(|e| !e.is_empty())
            .ok_or_else(|| {
                ApiError::Embedding("embedding response contained no vectors".to_string())
            })?;

        let matches = self
            .store
            .vector_search(
                &self.settings.index,
                &query_embedding,
                self.settings.num_candidates,
                self.settings.limit,
            )
            .await?;

        if !matches.is_empty() {
            tracing::info!(
                "Vector search matched {} passages (top score {:.3})",
                matches.len(),
                matches[0].score
            );
            return Ok(RetrievalResult::Vector(matches));
        }

        if self.fallback_pattern.is_empty() {
            tracing::warn!("No passages matched query or fallback patterns");
            return Ok(RetrievalResult::Empty);
        }

        let fallback = self
            .store
            .text_search(&self.fallback_pattern, self.settings.fallback_limit)
            .await?;

        if fallback.is_empty() {
            tracing::warn!("No passages matched query or fallback patterns");
            return Ok(RetrievalResult::Empty);
        }

        tracing::info!("Falling back to text search: {} passages", fallback.len());
        Ok(RetrievalResult::Fallback(
            fallback
                .into_iter()
                .map(|passage| ScoredPassage {
                    passage,
                    score: 0.0,
                })
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::llm::ChatRequest;
    use crate::rag::passage::Passage;

    struct FixedEmbedProvider {
        embedding: Vec<f32>,
        fail_rate_limited: bool,
    }

    #[async_trait]
    impl LlmProvider for FixedEmbedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(
            &self,
            _inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, ApiError> {
            if self.fail_rate_limited {
                return Err(ApiError::RateLimited {
                    retry_after: Some(3),
                });
            }
            Ok(vec![self.embedding.clone()])
        }

        async fn stream_chat(
            &self,
            _request: ChatRequest,
            _model_id: &str,
        ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    struct ScriptedStore {
        vector_rows: Vec<ScoredPassage>,
        text_rows: Vec<Passage>,
        vector_calls: AtomicUsize,
        text_calls: AtomicUsize,
    }

    impl ScriptedStore {
        fn new(vector_rows: Vec<ScoredPassage>, text_rows: Vec<Passage>) -> Self {
            Self {
                vector_rows,
                text_rows,
                vector_calls: AtomicUsize::new(0),
                text_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PassageStore for ScriptedStore {
        async fn ensure_index(&self, _index: &str, _dimensions: usize) -> Result<(), ApiError> {
            Ok(())
        }

        async fn insert(&self, _passage: Passage, _embedding: Vec<f32>) -> Result<(), ApiError> {
            Ok(())
        }

        async fn insert_batch(&self, _items: Vec<(Passage, Vec<f32>)>) -> Result<(), ApiError> {
            Ok(())
        }

        async fn vector_search(
            &self,
            _index: &str,
            _query_embedding: &[f32],
            _num_candidates: usize,
            _limit: usize,
        ) -> Result<Vec<ScoredPassage>, ApiError> {
            self.vector_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector_rows.clone())
        }

        async fn text_search(&self, _pattern: &str, _limit: usize) -> Result<Vec<Passage>, ApiError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text_rows.clone())
        }

        async fn count(&self) -> Result<usize, ApiError> {
            Ok(0)
        }

        async fn close(&self) {}
    }

    fn scored(text: &str, score: f32) -> ScoredPassage {
        ScoredPassage {
            passage: Passage::new(text.to_string(), "https://example.org".to_string(), None),
            score,
        }
    }

    fn retriever(
        provider: FixedEmbedProvider,
        store: Arc<ScriptedStore>,
    ) -> (Retriever, Arc<ScriptedStore>) {
        let r = Retriever::new(
            Arc::new(provider),
            store.clone(),
            RetrievalSettings::default(),
            "text-embedding-004".to_string(),
        );
        (r, store)
    }

    #[tokio::test]
    async fn vector_matches_skip_the_text_fallback() {
        let store = Arc::new(ScriptedStore::new(
            vec![scored("vector hit", 0.92)],
            vec![Passage::new(
                "fallback row".to_string(),
                "https://example.org".to_string(),
                None,
            )],
        ));
        let provider = FixedEmbedProvider {
            embedding: vec![0.5; 4],
            fail_rate_limited: false,
        };
        let (retriever, store) = retriever(provider, store);

        let result = retriever.retrieve("elders quorum").await.unwrap();
        match result {
            RetrievalResult::Vector(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].passage.text, "vector hit");
            }
            other => panic!("expected vector result, got {:?}", other),
        }
        assert_eq!(store.vector_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_vector_results_fall_back_to_text_search() {
        let store = Arc::new(ScriptedStore::new(
            Vec::new(),
            vec![Passage::new(
                "quorum of elders".to_string(),
                "https://example.org".to_string(),
                None,
            )],
        ));
        let provider = FixedEmbedProvider {
            embedding: vec![0.5; 4],
            fail_rate_limited: false,
        };
        let (retriever, store) = retriever(provider, store);

        let result = retriever.retrieve("anything").await.unwrap();
        match result {
            RetrievalResult::Fallback(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].passage.text, "quorum of elders");
                assert_eq!(rows[0].score, 0.0);
            }
            other => panic!("expected fallback result, got {:?}", other),
        }
        assert_eq!(store.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_everything_yields_empty_result() {
        let store = Arc::new(ScriptedStore::new(Vec::new(), Vec::new()));
        let provider = FixedEmbedProvider {
            embedding: vec![0.5; 4],
            fail_rate_limited: false,
        };
        let (retriever, _) = retriever(provider, store);

        let result = retriever.retrieve("anything").await.unwrap();
        assert!(result.is_empty());
        assert!(result.passages().is_empty());
    }

    #[tokio::test]
    async fn embedding_errors_propagate_before_the_store_is_touched() {
        let store = Arc::new(ScriptedStore::new(
            vec![scored("never reached", 1.0)],
            Vec::new(),
        ));
        let provider = FixedEmbedProvider {
            embedding: Vec::new(),
            fail_rate_limited: true,
        };
        let (retriever, store) = retriever(provider, store);

        let err = retriever.retrieve("anything").await.unwrap_err();
        match err {
            ApiError::RateLimited { retry_after } => assert_eq!(retry_after, Some(3)),
            other => panic!("expected rate limit error, got {:?}", other),
        }
        assert_eq!(store.vector_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_embedding_vectors_are_an_embedding_error() {
        let store = Arc::new(ScriptedStore::new(Vec::new(), Vec::new()));
        let provider = FixedEmbedProvider {
            embedding: Vec::new(),
            fail_rate_limited: false,
        };
        let (retriever, _) = retriever(provider, store);

        let err = retriever.retrieve("anything").await.unwrap_err();
        assert!(matches!(err, ApiError::Embedding(_)));
    }
}
