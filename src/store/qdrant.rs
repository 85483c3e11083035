//! Qdrant REST backend.
//!
//! Points carry the engram in their payload (`content`, `tags`, `source`). The
//! collection is created with cosine distance on first use. Tag filtering is
//! delegated to Qdrant as keyword `must` clauses, so it matches tags exactly
//! rather than by substring.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{CollectionInfo, ScoredEntry, StoreError, StoredEntry, TagFilter, VectorStore};
use crate::config::QdrantConfig;

pub struct QdrantStore {
    client: Client,
    url: String,
    api_key: Option<String>,
    collection: String,
    dimension: usize,
    ensured: OnceCell<()>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: Value,
    score: f64,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize, Default)]
struct Payload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct CollectionResult {
    #[serde(default)]
    points_count: Option<u64>,
    #[serde(default)]
    config: Option<Value>,
}

impl QdrantStore {
    pub fn new(config: &QdrantConfig, dimension: usize) -> anyhow::Result<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("qdrant backend selected but no URL configured (set QDRANT_URL)"))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            dimension,
            ensured: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/collections/{}{}", self.url, self.collection, path);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn create_collection(&self, dimension: usize) -> Result<(), StoreError> {
        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        self.send(self.request(Method::PUT, "").json(&body)).await?;
        tracing::info!(collection = %self.collection, dimension, "qdrant collection created");
        Ok(())
    }

    async fn open_or_create_collection(&self) -> Result<(), StoreError> {
        let response = self.request(Method::GET, "").send().await?;
        match response.status() {
            s if s.is_success() => {
                tracing::debug!(collection = %self.collection, "qdrant collection exists");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                tracing::info!(collection = %self.collection, "qdrant collection not found, creating it");
                self.create_collection(self.dimension).await
            }
            s => Err(StoreError::Status {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Create the collection if it does not exist yet. Runs once per store.
    async fn ensure_collection(&self) -> Result<(), StoreError> {
        self.ensured
            .get_or_try_init(|| self.open_or_create_collection())
            .await
            .map(|_| ())
    }
}

/// Build a Qdrant filter requiring every tag to be present on the point.
pub(crate) fn tag_filter_json(filter: &TagFilter) -> Option<Value> {
    if filter.is_empty() {
        return None;
    }
    let must: Vec<Value> = filter
        .tags()
        .iter()
        .map(|tag| json!({ "key": "tags", "match": { "value": tag } }))
        .collect();
    Some(json!({ "must": must }))
}

fn point_id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn configured_dimension(config: &Value) -> Option<usize> {
    config
        .pointer("/params/vectors/size")
        .and_then(Value::as_u64)
        .map(|d| d as usize)
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &TagFilter,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        self.ensure_collection().await?;

        let mut body = json!({ "vector": vector, "limit": limit, "with_payload": true });
        if let Some(f) = tag_filter_json(filter) {
            body["filter"] = f;
        }

        let hits: Envelope<Vec<SearchHit>> = self
            .send(self.request(Method::POST, "/points/search").json(&body))
            .await?
            .json()
            .await?;

        Ok(hits
            .result
            .into_iter()
            .map(|hit| {
                let payload = hit.payload.unwrap_or_default();
                ScoredEntry {
                    id: point_id_string(&hit.id),
                    content: payload.content,
                    tags: payload.tags,
                    source: payload.source,
                    score: hit.score,
                }
            })
            .collect())
    }

    async fn matching_count(&self, filter: &TagFilter) -> Result<u64, StoreError> {
        self.ensure_collection().await?;

        let mut body = json!({ "exact": true });
        if let Some(f) = tag_filter_json(filter) {
            body["filter"] = f;
        }

        let count: Envelope<CountResult> = self
            .send(self.request(Method::POST, "/points/count").json(&body))
            .await?
            .json()
            .await?;
        Ok(count.result.count)
    }

    async fn upsert(&self, entry: StoredEntry) -> Result<(), StoreError> {
        if entry.embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                found: entry.embedding.len(),
            });
        }
        self.ensure_collection().await?;

        let id = entry.id.clone();
        let body = json!({
            "points": [{
                "id": entry.id,
                "vector": entry.embedding,
                "payload": {
                    "content": entry.content,
                    "tags": entry.tags.unwrap_or_default(),
                    "source": entry.source,
                }
            }]
        });
        self.send(self.request(Method::PUT, "/points?wait=true").json(&body))
            .await?;
        tracing::debug!(id = %id, "qdrant point upserted");
        Ok(())
    }

    async fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
        let response = self.request(Method::GET, "").send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(CollectionInfo {
                point_count: 0,
                dimension: None,
            });
        }
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let info: Envelope<CollectionResult> = response.json().await?;
        Ok(CollectionInfo {
            point_count: info.result.points_count.unwrap_or(0),
            dimension: info.result.config.as_ref().and_then(configured_dimension),
        })
    }

    async fn recreate(&self, dimension: usize) -> Result<(), StoreError> {
        let response = self.request(Method::DELETE, "").send().await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        self.create_collection(dimension).await?;
        // The collection is known to exist from here on.
        let _ = self.ensured.set(());
        Ok(())
    }
}
