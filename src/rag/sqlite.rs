//! SQLite-backed passage store implementation.
//!
//! In-process vector store using SQLite for the corpus and brute-force
//! cosine similarity for ranking. The named vector index lives in a meta
//! table so searches against a mismatched index degrade to zero rows.

use std::path::PathBuf;

use async_trait::async_trait;
use regex::RegexBuilder;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::passage::{Passage, PassageMetadata, ScoredPassage};
use super::store::PassageStore;
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

pub struct SqlitePassageStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqlitePassageStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                metadata TEXT DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS passage_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_passage(row: &sqlx::sqlite::SqliteRow) -> Passage {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<PassageMetadata>(&metadata_str).ok();

        Passage {
            id: row.get("id"),
            text: row.get("text"),
            url: row.get("url"),
            metadata,
        }
    }

    async fn registered_index(&self) -> Result<Option<(String, usize)>, ApiError> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT value FROM passage_meta WHERE key = 'index_name'")
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        let dimensions: Option<String> =
            sqlx::query_scalar("SELECT value FROM passage_meta WHERE key = 'dimensions'")
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        match (name, dimensions.and_then(|v| v.parse::<usize>().ok())) {
            (Some(name), Some(dimensions)) => Ok(Some((name, dimensions))),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PassageStore for SqlitePassageStore {
    async fn ensure_index(&self, index: &str, dimensions: usize) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT OR REPLACE INTO passage_meta (key, value, updated_at)
             VALUES ('index_name', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(index)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT OR REPLACE INTO passage_meta (key, value, updated_at)
             VALUES ('dimensions', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(dimensions.to_string())
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn insert(&self, passage: Passage, embedding: Vec<f32>) -> Result<(), ApiError> {
        let blob = Self::serialize_embedding(&embedding);
        let metadata_str = passage
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_default())
            .unwrap_or_else(|| "{}".to_string());

        sqlx::query(
            "INSERT OR REPLACE INTO passages (id, text, url, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&passage.id)
        .bind(&passage.text)
        .bind(&passage.url)
        .bind(&metadata_str)
        .bind(&blob)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn insert_batch(&self, items: Vec<(Passage, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (passage, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = passage
                .metadata
                .as_ref()
                .map(|m| serde_json::to_string(m).unwrap_or_default())
                .unwrap_or_else(|| "{}".to_string());

            sqlx::query(
                "INSERT OR REPLACE INTO passages (id, text, url, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&passage.id)
            .bind(&passage.text)
            .bind(&passage.url)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn vector_search(
        &self,
        index: &str,
        query_embedding: &[f32],
        num_candidates: usize,
        limit: usize,
    ) -> Result<Vec<ScoredPassage>, ApiError> {
        let Some((index_name, dimensions)) = self.registered_index().await? else {
            tracing::warn!("Vector search before any index was registered; returning no rows");
            return Ok(Vec::new());
        };

        if index != index_name {
            tracing::warn!(
                "Vector search against unknown index '{}' (registered: '{}'); returning no rows",
                index,
                index_name
            );
            return Ok(Vec::new());
        }

        if query_embedding.len() != dimensions {
            tracing::warn!(
                "Query embedding has {} dimensions, index '{}' expects {}; returning no rows",
                query_embedding.len(),
                index_name,
                dimensions
            );
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, text, url, metadata, embedding
             FROM passages",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<ScoredPassage> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> =
                    row.get::<Option<Vec<u8>>, _>("embedding").unwrap_or_default();
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored_emb);

                Some(ScoredPassage {
                    passage: Self::row_to_passage(row),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(num_candidates.max(1));
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn text_search(&self, pattern: &str, limit: usize) -> Result<Vec<Passage>, ApiError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let regex = RegexBuilder::new(trimmed)
            .case_insensitive(true)
            .build()
            .map_err(|e| ApiError::Internal(format!("invalid text search pattern: {}", e)))?;

        // SQLite has no REGEXP by default; filter in process, in insertion
        // order, over passages that carry an embedding.
        let rows = sqlx::query(
            "SELECT id, text, url, metadata
             FROM passages
             WHERE embedding IS NOT NULL AND LENGTH(embedding) > 0
             ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let cap = limit.max(1);
        let mut matches = Vec::new();
        for row in &rows {
            let passage = Self::row_to_passage(row);
            if regex.is_match(&passage.text) {
                matches.push(passage);
                if matches.len() >= cap {
                    break;
                }
            }
        }

        Ok(matches)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passages")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqlitePassageStore {
        let tmp = std::env::temp_dir().join(format!(
            "quorum-passages-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        SqlitePassageStore::with_path(tmp).await.unwrap()
    }

    fn make_passage(text: &str, url: &str) -> Passage {
        Passage::new(
            text.to_string(),
            url.to_string(),
            Some(PassageMetadata {
                chunk_index: 1,
                total_chunks: 1,
            }),
        )
    }

    #[tokio::test]
    async fn insert_and_vector_search_ranks_by_similarity() {
        let store = test_store().await;
        store.ensure_index("vector_index", 3).await.unwrap();

        store
            .insert(
                make_passage("Elders quorum presidencies", "https://example.org/a"),
                vec![1.0, 0.0, 0.0],
            )
            .await
            .unwrap();
        store
            .insert(
                make_passage("Sunday meeting schedule", "https://example.org/b"),
                vec![0.0, 1.0, 0.0],
            )
            .await
            .unwrap();

        let results = store
            .vector_search("vector_index", &[1.0, 0.0, 0.0], 20, 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].passage.text, "Elders quorum presidencies");
        assert_eq!(results[0].passage.url, "https://example.org/a");
        assert!(results[0].score > 0.99);
        assert!(results[1].score < 0.01);
    }

    #[tokio::test]
    async fn vector_search_without_registered_index_returns_no_rows() {
        let store = test_store().await;
        store
            .insert(make_passage("some text", "https://example.org"), vec![1.0])
            .await
            .unwrap();

        let results = store
            .vector_search("vector_index", &[1.0], 20, 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn vector_search_against_unknown_index_returns_no_rows() {
        let store = test_store().await;
        store.ensure_index("vector_index", 1).await.unwrap();
        store
            .insert(make_passage("some text", "https://example.org"), vec![1.0])
            .await
            .unwrap();

        let results = store.vector_search("other_index", &[1.0], 20, 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn vector_search_with_wrong_dimensions_returns_no_rows() {
        let store = test_store().await;
        store.ensure_index("vector_index", 3).await.unwrap();
        store
            .insert(
                make_passage("some text", "https://example.org"),
                vec![1.0, 0.0, 0.0],
            )
            .await
            .unwrap();

        let results = store
            .vector_search("vector_index", &[1.0, 0.0], 20, 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn vector_search_honors_candidate_pool_and_limit() {
        let store = test_store().await;
        store.ensure_index("vector_index", 2).await.unwrap();

        for i in 0..6 {
            let weight = 1.0 - (i as f32) * 0.1;
            store
                .insert(
                    make_passage(&format!("passage {}", i), "https://example.org"),
                    vec![weight, 1.0 - weight],
                )
                .await
                .unwrap();
        }

        let results = store
            .vector_search("vector_index", &[1.0, 0.0], 4, 2)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].passage.text, "passage 0");
        assert_eq!(results[1].passage.text, "passage 1");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn vector_search_skips_passages_without_embeddings() {
        let store = test_store().await;
        store.ensure_index("vector_index", 1).await.unwrap();

        store
            .insert(make_passage("embedded", "https://example.org/a"), vec![1.0])
            .await
            .unwrap();
        store
            .insert(make_passage("not embedded", "https://example.org/b"), vec![])
            .await
            .unwrap();

        let results = store
            .vector_search("vector_index", &[1.0], 20, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.text, "embedded");
    }

    #[tokio::test]
    async fn text_search_matches_regex_case_insensitive_in_insertion_order() {
        let store = test_store().await;
        store.ensure_index("vector_index", 1).await.unwrap();

        store
            .insert(
                make_passage("The Elders Quorum presidency meets weekly", "https://example.org/1"),
                vec![1.0],
            )
            .await
            .unwrap();
        store
            .insert(
                make_passage("Relief Society guidance", "https://example.org/2"),
                vec![1.0],
            )
            .await
            .unwrap();
        store
            .insert(
                make_passage("each QUORUM of ELDERS serves", "https://example.org/3"),
                vec![1.0],
            )
            .await
            .unwrap();
        store
            .insert(make_passage("elders quorum but unembedded", "https://example.org/4"), vec![])
            .await
            .unwrap();

        let matches = store
            .text_search("elders.*quorum|quorum.*elders", 5)
            .await
            .unwrap();

        let texts: Vec<&str> = matches.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "The Elders Quorum presidency meets weekly",
                "each QUORUM of ELDERS serves"
            ]
        );
    }

    #[tokio::test]
    async fn text_search_caps_matches_at_limit() {
        let store = test_store().await;
        store.ensure_index("vector_index", 1).await.unwrap();

        for i in 0..7 {
            store
                .insert(
                    make_passage(
                        &format!("elders quorum passage {}", i),
                        "https://example.org",
                    ),
                    vec![1.0],
                )
                .await
                .unwrap();
        }

        let matches = store.text_search("elders.*quorum", 5).await.unwrap();
        assert_eq!(matches.len(), 5);
        assert_eq!(matches[0].text, "elders quorum passage 0");
        assert_eq!(matches[4].text, "elders quorum passage 4");
    }

    #[tokio::test]
    async fn insert_batch_and_count() {
        let store = test_store().await;
        store.ensure_index("vector_index", 1).await.unwrap();

        let items = (0..3)
            .map(|i| {
                (
                    make_passage(&format!("passage {}", i), "https://example.org"),
                    vec![1.0],
                )
            })
            .collect();

        store.insert_batch(items).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn metadata_round_trips_in_camel_case() {
        let store = test_store().await;
        store.ensure_index("vector_index", 1).await.unwrap();

        let passage = Passage::new(
            "chunked text".to_string(),
            "https://example.org".to_string(),
            Some(PassageMetadata {
                chunk_index: 2,
                total_chunks: 9,
            }),
        );
        store.insert(passage, vec![1.0]).await.unwrap();

        let raw: String = sqlx::query_scalar("SELECT metadata FROM passages")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert!(raw.contains("\"chunkIndex\":2"));
        assert!(raw.contains("\"totalChunks\":9"));

        let results = store
            .vector_search("vector_index", &[1.0], 20, 10)
            .await
            .unwrap();
        let metadata = results[0].passage.metadata.as_ref().unwrap();
        assert_eq!(metadata.chunk_index, 2);
        assert_eq!(metadata.total_chunks, 9);
    }
}
