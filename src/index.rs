//! On-disk vector index with all-or-nothing replacement.
//!
//! # Layout
//!
//! ```text
//! <index.path>/
//!   CURRENT                  # name of the active generation
//!   gen-<uuid>/index.sqlite  # chunks, their embeddings, and metadata
//! ```
//!
//! [`replace_index`] embeds every chunk before touching the disk, writes a
//! complete new generation next to the active one, then atomically rewrites
//! `CURRENT` (write temp file + rename). Only after the swap are older
//! generations deleted. A failure at any step leaves the previous index
//! readable and removes the half-written generation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SimilarityMetric;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::migrate;
use crate::models::{Chunk, RetrievedChunk};

const CURRENT_FILE: &str = "CURRENT";
const DB_FILE: &str = "index.sqlite";
const GENERATION_PREFIX: &str = "gen-";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("No index found. Process documents first.")]
    Missing,
    #[error("Index is corrupt: {0}")]
    Corrupt(String),
    #[error("Index does not match the embedding model: {0}. Process documents again.")]
    Mismatch(String),
}

/// True when `err` (or anything in its chain) is [`IndexError::Missing`].
pub fn is_missing_index(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| matches!(e.downcast_ref::<IndexError>(), Some(IndexError::Missing)))
}

/// Metadata describing one persisted index generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub generation: String,
    pub model: String,
    pub dims: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Build a new index from `chunks` and make it the only index under `root`.
pub async fn replace_index(
    root: &Path,
    chunks: &[Chunk],
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<IndexSummary> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = if texts.is_empty() {
        Vec::new()
    } else {
        embedding::embed_all(provider, &texts, batch_size).await?
    };

    let dims = match vectors.first() {
        Some(first) => first.len(),
        None => provider.dims(),
    };
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        anyhow::bail!(
            "Embedding provider returned vectors of mixed dimensionality ({} and {})",
            dims,
            bad.len()
        );
    }
    if !vectors.is_empty() && dims != provider.dims() {
        tracing::warn!(
            configured = provider.dims(),
            actual = dims,
            "embedding dims differ from configuration; recording actual dims"
        );
    }

    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create index directory: {}", root.display()))?;

    let generation = format!("{}{}", GENERATION_PREFIX, Uuid::new_v4());
    let staging = root.join(&generation);
    let summary = IndexSummary {
        generation: generation.clone(),
        model: provider.model_name().to_string(),
        dims,
        chunk_count: chunks.len(),
        created_at: Utc::now(),
    };

    let result: Result<()> = async {
        write_generation(&staging, &summary, chunks, &vectors).await?;
        activate(root, &generation)?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
            tracing::warn!(dir = %staging.display(), error = %cleanup, "failed to remove staging index");
        }
        return Err(e);
    }

    prune_generations(root, &generation);
    tracing::info!(
        generation = %generation,
        chunks = summary.chunk_count,
        dims = summary.dims,
        "index replaced"
    );
    Ok(summary)
}

async fn write_generation(
    dir: &Path,
    summary: &IndexSummary,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<()> {
    let pool = db::create(&dir.join(DB_FILE)).await?;
    migrate::create_schema(&pool).await?;

    let mut tx = pool.begin().await?;
    for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
        sqlx::query(
            "INSERT INTO chunks (id, chunk_index, text, hash, embedding) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(embedding::vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;
    }

    let meta = [
        ("model", summary.model.clone()),
        ("dims", summary.dims.to_string()),
        ("chunk_count", summary.chunk_count.to_string()),
        ("created_at", summary.created_at.to_rfc3339()),
    ];
    for (key, value) in meta {
        sqlx::query("INSERT INTO meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    pool.close().await;
    Ok(())
}

/// Atomically point `CURRENT` at `generation`.
fn activate(root: &Path, generation: &str) -> Result<()> {
    let tmp = root.join(format!("{}.tmp-{}", CURRENT_FILE, Uuid::new_v4()));
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(generation.as_bytes())?;
        file.sync_all()?;
    }
    if let Err(e) = std::fs::rename(&tmp, root.join(CURRENT_FILE)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).context("Failed to activate new index");
    }
    Ok(())
}

/// Delete every generation and stray pointer temp file except `keep`.
fn prune_generations(root: &Path, keep: &str) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "could not list index directory for cleanup");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let outcome = if name.starts_with(GENERATION_PREFIX) && name != keep {
            std::fs::remove_dir_all(&path)
        } else if name.starts_with(&format!("{}.tmp-", CURRENT_FILE)) {
            std::fs::remove_file(&path)
        } else {
            continue;
        };
        match outcome {
            Ok(()) => tracing::debug!(path = %path.display(), "removed old index data"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove old index data"),
        }
    }
}

/// Read handle on the active index generation.
pub struct VectorIndex {
    pool: SqlitePool,
    summary: IndexSummary,
}

impl VectorIndex {
    /// Open the active generation under `root`.
    ///
    /// Fails with [`IndexError::Missing`] when no index was ever built.
    pub async fn open(root: &Path) -> Result<Self> {
        let pointer = root.join(CURRENT_FILE);
        let generation = match std::fs::read_to_string(&pointer) {
            Ok(s) => s.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::Missing.into())
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", pointer.display()))
            }
        };

        if !generation.starts_with(GENERATION_PREFIX)
            || generation.contains(['/', '\\'])
            || generation.contains("..")
        {
            return Err(IndexError::Corrupt(format!(
                "CURRENT names an invalid generation '{}'",
                generation
            ))
            .into());
        }

        let db_path = root.join(&generation).join(DB_FILE);
        if !db_path.is_file() {
            return Err(IndexError::Corrupt(format!(
                "generation '{}' has no database",
                generation
            ))
            .into());
        }

        let pool = db::open_read_only(&db_path).await?;
        let summary = read_summary(&pool, &generation).await?;

        Ok(Self {
            pool,
            summary,
        })
    }

    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    /// Brute-force similarity scan. Returns at most `k` chunks, best first.
    pub async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        metric: SimilarityMetric,
    ) -> Result<Vec<RetrievedChunk>> {
        if query_vec.len() != self.summary.dims {
            return Err(IndexError::Mismatch(format!(
                "query has {} dims, index has {}",
                query_vec.len(),
                self.summary.dims
            ))
            .into());
        }

        let rows = sqlx::query("SELECT chunk_index, text, hash, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk_index: i64 = row.get("chunk_index");
            let text: String = row.get("text");
            let hash: String = row.get("hash");
            if crate::chunk::hash_text(&text) != hash {
                return Err(IndexError::Corrupt(format!(
                    "chunk {} does not match its stored hash",
                    chunk_index
                ))
                .into());
            }

            let blob: Vec<u8> = row.get("embedding");
            let vector = embedding::blob_to_vec(&blob);
            let score = match metric {
                SimilarityMetric::Cosine => embedding::cosine_similarity(query_vec, &vector),
                SimilarityMetric::Euclidean => -embedding::euclidean_distance(query_vec, &vector),
            } as f64;

            results.push(RetrievedChunk {
                chunk_index,
                text,
                score,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        results.truncate(k);
        Ok(results)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn read_summary(pool: &SqlitePool, generation: &str) -> Result<IndexSummary> {
    let rows = sqlx::query("SELECT key, value FROM meta")
        .fetch_all(pool)
        .await?;

    let lookup = |key: &str| -> Result<String> {
        rows.iter()
            .find(|r| r.get::<String, _>("key") == key)
            .map(|r| r.get::<String, _>("value"))
            .ok_or_else(|| IndexError::Corrupt(format!("missing meta key '{}'", key)).into())
    };

    let dims = lookup("dims")?
        .parse::<usize>()
        .map_err(|e| IndexError::Corrupt(format!("bad dims: {}", e)))?;
    let chunk_count = lookup("chunk_count")?
        .parse::<usize>()
        .map_err(|e| IndexError::Corrupt(format!("bad chunk_count: {}", e)))?;
    let created_at = DateTime::parse_from_rfc3339(&lookup("created_at")?)
        .map_err(|e| IndexError::Corrupt(format!("bad created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(IndexSummary {
        generation: generation.to_string(),
        model: lookup("model")?,
        dims,
        chunk_count,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Maps each text to a one-hot-ish vector keyed on its first byte.
    struct FirstLetterProvider;

    #[async_trait]
    impl EmbeddingProvider for FirstLetterProvider {
        fn model_name(&self) -> &str {
            "first-letter"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    let slot = t
                        .bytes()
                        .find(|b| b.is_ascii_alphabetic())
                        .map(|b| (b.to_ascii_lowercase() - b'a') as usize)
                        .unwrap_or(0);
                    v[slot] = 1.0;
                    v
                })
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("OpenAI embeddings API error 401 Unauthorized")
        }
    }

    fn generations(root: &Path) -> Vec<String> {
        std::fs::read_dir(root)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(GENERATION_PREFIX))
            .collect()
    }

    #[tokio::test]
    async fn test_open_without_index_is_missing() {
        let tmp = TempDir::new().unwrap();
        let err = VectorIndex::open(&tmp.path().join("index")).await.err().unwrap();
        assert!(is_missing_index(&err));
        assert_eq!(err.to_string(), "No index found. Process documents first.");
    }

    #[tokio::test]
    async fn test_build_and_search() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("index");
        let chunks = vec![
            chunk_text("apples are red", 100, 10).remove(0),
            Chunk {
                chunk_index: 1,
                ..chunk_text("bananas are yellow", 100, 10).remove(0)
            },
        ];
        let summary = replace_index(&root, &chunks, &FirstLetterProvider, 8)
            .await
            .unwrap();
        assert_eq!(summary.chunk_count, 2);
        assert_eq!(summary.dims, 26);

        let index = VectorIndex::open(&root).await.unwrap();
        assert_eq!(index.summary().model, "first-letter");
        let query = FirstLetterProvider
            .embed_texts(&["banana?".to_string()])
            .await
            .unwrap()
            .remove(0);
        let hits = index.search(&query, 1, SimilarityMetric::Cosine).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "bananas are yellow");

        let hits = index
            .search(&query, 5, SimilarityMetric::Euclidean)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "bananas are yellow");
        index.close().await;
    }

    #[tokio::test]
    async fn test_replace_keeps_single_generation() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("index");
        let first = chunk_text("alpha", 100, 10);
        let second = chunk_text("beta", 100, 10);

        replace_index(&root, &first, &FirstLetterProvider, 8).await.unwrap();
        let summary = replace_index(&root, &second, &FirstLetterProvider, 8)
            .await
            .unwrap();

        assert_eq!(generations(&root), vec![summary.generation.clone()]);
        let index = VectorIndex::open(&root).await.unwrap();
        assert_eq!(index.summary().generation, summary.generation);
        index.close().await;
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_index() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("index");
        let original = replace_index(&root, &chunk_text("alpha", 100, 10), &FirstLetterProvider, 8)
            .await
            .unwrap();

        let err = replace_index(&root, &chunk_text("beta", 100, 10), &FailingProvider, 8)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));

        assert_eq!(generations(&root), vec![original.generation.clone()]);
        let index = VectorIndex::open(&root).await.unwrap();
        assert_eq!(index.summary().generation, original.generation);
        index.close().await;
    }

    #[tokio::test]
    async fn test_empty_chunk_list_builds_empty_index() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("index");
        let summary = replace_index(&root, &[], &FailingProvider, 8).await.unwrap();
        assert_eq!(summary.chunk_count, 0);

        let index = VectorIndex::open(&root).await.unwrap();
        let hits = index
            .search(&[1.0, 0.0, 0.0], 4, SimilarityMetric::Cosine)
            .await
            .unwrap();
        assert!(hits.is_empty());
        index.close().await;
    }

    #[tokio::test]
    async fn test_invalid_pointer_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("index");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(CURRENT_FILE), "../elsewhere").unwrap();
        let err = VectorIndex::open(&root).await.err().unwrap();
        assert!(!is_missing_index(&err));
        assert!(err.to_string().contains("invalid generation"));
    }

    #[tokio::test]
    async fn test_search_rejects_query_of_other_dims() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("index");
        let chunks = chunk_text("alpha text", 100, 10);
        replace_index(&root, &chunks, &FirstLetterProvider, 8)
            .await
            .unwrap();

        let index = VectorIndex::open(&root).await.unwrap();
        let err = index
            .search(&[1.0, 0.0, 0.0], 4, SimilarityMetric::Cosine)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::Mismatch(_))
        ));
        assert!(err.to_string().contains("query has 3 dims, index has 26"));
        index.close().await;
    }
}
