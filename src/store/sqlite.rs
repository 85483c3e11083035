//! Local engram store on SQLite with in-process ranking.
//!
//! Engrams live in the `engrams` table with embeddings as little-endian f32 blobs.
//! Search loads the tag-filtered candidates in insertion order and hands them to
//! [`crate::ranker::rank`]. The vector dimension is fixed by the first insert (or
//! by [`recreate`](VectorStore::recreate)) and recorded in `schema_meta`.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use super::{CollectionInfo, ScoredEntry, StoreError, StoredEntry, TagFilter, VectorStore};
use crate::db::migrations;
use crate::ranker;

pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| StoreError::Task(format!("db lock poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Serialize an embedding as little-endian f32 bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_bytes`].
pub fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::Decode(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Insert or replace an engram, enforcing the store's vector dimension.
pub fn upsert_entry(conn: &mut Connection, entry: &StoredEntry) -> Result<(), StoreError> {
    let tx = conn.transaction()?;

    match migrations::get_vector_dimension(&tx)? {
        Some(expected) if expected != entry.embedding.len() => {
            return Err(StoreError::DimensionMismatch {
                expected,
                found: entry.embedding.len(),
            });
        }
        Some(_) => {}
        None => migrations::set_vector_dimension(&tx, entry.embedding.len())?,
    }

    let tags = entry
        .tags
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Decode(e.to_string()))?;

    tx.execute("DELETE FROM engrams WHERE id = ?1", params![entry.id])?;
    tx.execute(
        "INSERT INTO engrams (id, content, embedding, tags, source, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.content,
            embedding_to_bytes(&entry.embedding),
            tags,
            entry.source,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;

    tx.commit()?;
    Ok(())
}

/// Load every engram that passes `filter`, in insertion order.
pub fn load_candidates(conn: &Connection, filter: &TagFilter) -> Result<Vec<StoredEntry>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, content, embedding, tags, source FROM engrams ORDER BY seq")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Vec<u8>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, content, blob, tags_json, source) = row?;
        let tags: Option<Vec<String>> = tags_json
            .map(|t| serde_json::from_str(&t))
            .transpose()
            .map_err(|e| StoreError::Decode(format!("tags for {id}: {e}")))?;
        if !filter.matches(tags.as_deref()) {
            continue;
        }
        entries.push(StoredEntry {
            embedding: bytes_to_embedding(&blob)?,
            id,
            content,
            tags,
            source,
        });
    }
    Ok(entries)
}

/// Tag-filter, then rank by cosine similarity.
pub fn search_entries(
    conn: &Connection,
    vector: &[f32],
    limit: usize,
    filter: &TagFilter,
) -> Result<Vec<ScoredEntry>, StoreError> {
    let candidates = load_candidates(conn, filter)?;
    let ranked = ranker::rank(vector, candidates, limit)?;
    Ok(ranked
        .into_iter()
        .map(|r| ScoredEntry {
            id: r.item.id,
            content: r.item.content,
            tags: r.item.tags,
            source: r.item.source,
            score: r.similarity,
        })
        .collect())
}

pub fn count_entries(conn: &Connection) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM engrams", [], |r| r.get(0))?;
    Ok(count as u64)
}

/// Delete every engram and pin the dimension for future inserts.
pub fn clear_entries(conn: &mut Connection, dimension: usize) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM engrams", [])?;
    migrations::set_vector_dimension(&tx, dimension)?;
    tx.commit()?;
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &TagFilter,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let vector = vector.to_vec();
        let filter = filter.clone();
        self.with_conn(move |conn| search_entries(conn, &vector, limit, &filter))
            .await
    }

    async fn matching_count(&self, filter: &TagFilter) -> Result<u64, StoreError> {
        if filter.is_empty() {
            return self.with_conn(|conn| count_entries(conn)).await;
        }
        let filter = filter.clone();
        self.with_conn(move |conn| Ok(load_candidates(conn, &filter)?.len() as u64))
            .await
    }

    async fn upsert(&self, entry: StoredEntry) -> Result<(), StoreError> {
        self.with_conn(move |conn| upsert_entry(conn, &entry)).await
    }

    async fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
        self.with_conn(|conn| {
            Ok(CollectionInfo {
                point_count: count_entries(conn)?,
                dimension: migrations::get_vector_dimension(conn)?,
            })
        })
        .await
    }

    async fn recreate(&self, dimension: usize) -> Result<(), StoreError> {
        tracing::info!(dimension, "clearing local knowledge base");
        self.with_conn(move |conn| clear_entries(conn, dimension))
            .await
    }
}
