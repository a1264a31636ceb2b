//! Abstract interface for passage storage backends.
//!
//! The chat pipeline only reads. `ensure_index` and the insert methods are
//! the contract the offline ingestion job writes through, and the tests use
//! them to seed corpora.

use async_trait::async_trait;

use super::passage::{Passage, ScoredPassage};
use crate::core::errors::ApiError;

#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Register the named vector index and its embedding dimension count.
    async fn ensure_index(&self, index: &str, dimensions: usize) -> Result<(), ApiError>;

    /// Insert a passage with its embedding vector.
    async fn insert(&self, passage: Passage, embedding: Vec<f32>) -> Result<(), ApiError>;

    /// Insert multiple passages in one transaction.
    async fn insert_batch(&self, items: Vec<(Passage, Vec<f32>)>) -> Result<(), ApiError>;

    /// Rank passages by similarity to the query embedding, scoped to the
    /// named index.
    ///
    /// An unknown index name or a query vector whose dimension count does
    /// not match the registered index yields zero rows rather than an
    /// error; the caller's fallback path covers that misconfiguration.
    async fn vector_search(
        &self,
        index: &str,
        query_embedding: &[f32],
        num_candidates: usize,
        limit: usize,
    ) -> Result<Vec<ScoredPassage>, ApiError>;

    /// Unranked case-insensitive regex match over passage text, in
    /// ingestion order. Only passages that carry an embedding are eligible.
    async fn text_search(&self, pattern: &str, limit: usize) -> Result<Vec<Passage>, ApiError>;

    /// Total number of stored passages.
    async fn count(&self) -> Result<usize, ApiError>;

    /// Close the underlying connections.
    async fn close(&self);
}
