use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chunk position within its source page, written by the ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageMetadata {
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A handbook excerpt with the page it was scraped from.
///
/// Passages are immutable once written; the chat pipeline only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub url: String,
    pub metadata: Option<PassageMetadata>,
}

impl Passage {
    pub fn new(text: String, url: String, metadata: Option<PassageMetadata>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            url,
            metadata,
        }
    }
}

/// One retrieval entry: a passage with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    /// Similarity score (higher = better). Fallback matches carry 0.0.
    pub score: f32,
}
