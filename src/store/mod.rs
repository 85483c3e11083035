//! Engram knowledge base.
//!
//! The [`VectorStore`] trait is the seam between the synthesis/ingestion pipelines
//! and wherever engrams live: [`sqlite::SqliteStore`] keeps them in the local
//! database and ranks in-process, [`qdrant::QdrantStore`] talks to a Qdrant server.

pub mod qdrant;
pub mod sqlite;

use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::Mem42Config;
use crate::ranker::{Embedded, RankError};

/// One unit of retrievable knowledge: a distilled engram and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Lowercase tags; `None` means untagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Human-readable origin, e.g. the uploaded filename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl StoredEntry {
    /// Build a new entry with a fresh time-sortable id.
    pub fn new(content: String, embedding: Vec<f32>, tags: Vec<String>, source: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            content,
            embedding,
            tags: if tags.is_empty() { None } else { Some(tags) },
            source,
        }
    }
}

impl Embedded for StoredEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

/// A retrieved entry with its similarity score. The embedding is not carried back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub point_count: u64,
    pub dimension: Option<usize>,
}

/// Tag pre-filter for retrieval.
///
/// An entry matches when every filter tag is a case-insensitive substring of at least
/// one of the entry's tags. An empty filter matches everything; an untagged entry
/// matches only the empty filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    tags: Vec<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn matches(&self, entry_tags: Option<&[String]>) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let Some(entry_tags) = entry_tags else {
            return false;
        };
        let entry_tags: Vec<String> = entry_tags.iter().map(|t| t.to_lowercase()).collect();
        self.tags
            .iter()
            .all(|wanted| entry_tags.iter().any(|have| have.contains(wanted.as_str())))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("vector store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("vector store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("vector has {found} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Rank(#[from] RankError),

    #[error("failed to decode stored data: {0}")]
    Decode(String),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Storage for engrams with similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Top `limit` entries by cosine similarity to `vector`, restricted by `filter`.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &TagFilter,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Number of entries `filter` lets through.
    async fn matching_count(&self, filter: &TagFilter) -> Result<u64, StoreError>;

    /// Insert or replace an entry by id.
    async fn upsert(&self, entry: StoredEntry) -> Result<(), StoreError>;

    async fn collection_info(&self) -> Result<CollectionInfo, StoreError>;

    /// Drop every entry and reset the store to hold vectors of `dimension`.
    async fn recreate(&self, dimension: usize) -> Result<(), StoreError>;
}

/// Empty the knowledge base for vectors of `dimension` and record the embedding
/// model that will refill it, so the startup model check passes again.
pub async fn clear_knowledge(
    store: &dyn VectorStore,
    db: &Arc<Mutex<Connection>>,
    dimension: usize,
    embedding_model: &str,
) -> Result<(), StoreError> {
    store.recreate(dimension).await?;

    let db = Arc::clone(db);
    let model = embedding_model.to_string();
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| StoreError::Task(format!("db lock poisoned: {e}")))?;
        crate::db::migrations::set_embedding_model(&conn, &model)?;
        Ok::<_, StoreError>(())
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))??;

    tracing::info!(dimension, embedding_model, "knowledge base cleared");
    Ok(())
}

/// Create the configured vector store backend.
pub fn create_store(
    config: &Mem42Config,
    db: Arc<Mutex<Connection>>,
) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.storage.backend.as_str() {
        "sqlite" => Ok(Arc::new(sqlite::SqliteStore::new(db))),
        "qdrant" => {
            let store = qdrant::QdrantStore::new(&config.qdrant, config.generation.embedding_dim)?;
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unknown storage backend: {other}. Supported: sqlite, qdrant"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(filter: &TagFilter, list: &[&str]) -> bool {
        let tags: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        filter.matches(Some(tags.as_slice()))
    }

    #[test]
    fn filter_matches_substrings_case_insensitively() {
        let filter = TagFilter::new(["FIN"]);
        assert!(hit(&filter, &["finance-2024"]));
        assert!(hit(&filter, &["Refinancing"]));
        assert!(!hit(&filter, &["budget"]));
    }

    #[test]
    fn every_filter_tag_must_hit_some_entry_tag() {
        let filter = TagFilter::new(["fin", "q3"]);
        assert!(hit(&filter, &["finance", "q3-report"]));
        assert!(!hit(&filter, &["finance", "q4-report"]));
    }

    #[test]
    fn empty_filter_matches_untagged() {
        let filter = TagFilter::new(Vec::<String>::new());
        assert!(filter.is_empty());
        assert!(filter.matches(None));
        assert!(hit(&filter, &["anything"]));
    }

    #[test]
    fn untagged_entry_fails_non_empty_filter() {
        assert!(!TagFilter::new(["news"]).matches(None));
        assert!(!hit(&TagFilter::new(["news"]), &[]));
    }

    #[test]
    fn filter_normalizes_input() {
        let filter = TagFilter::new([" News ", "", "  "]);
        assert_eq!(filter.tags(), &["news".to_string()]);
    }

    #[test]
    fn new_entry_without_tags_is_untagged() {
        let entry = StoredEntry::new("c".into(), vec![1.0], vec![], None);
        assert!(entry.tags.is_none());
        assert!(!entry.id.is_empty());
    }
}
