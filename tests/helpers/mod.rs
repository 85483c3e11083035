#![allow(dead_code)]

use async_trait::async_trait;
use mem42::db;
use mem42::llm::{ApiError, Embedder, GenerationOptions, TextGenerator};
use mem42::store::sqlite::SqliteStore;
use mem42::store::StoredEntry;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::sync::{Barrier, Notify};

pub const DIM: usize = 8;

/// Open a fresh in-memory database wrapped for sharing with a store.
pub fn test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(db::open_memory_database().unwrap()))
}

/// An in-memory SQLite store plus its connection handle.
pub fn test_store() -> (Arc<Mutex<Connection>>, Arc<SqliteStore>) {
    let db = test_db();
    let store = Arc::new(SqliteStore::new(Arc::clone(&db)));
    (db, store)
}

/// Deterministic `DIM`-sized embedding with a spike at position `seed`.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed % DIM] = 1.0;
    v
}

/// Like [`test_embedding`] but leaning towards `other` by `weight`.
pub fn blended_embedding(seed: usize, other: usize, weight: f32) -> Vec<f32> {
    let mut v = test_embedding(seed);
    v[other % DIM] += weight;
    v
}

pub fn entry(content: &str, embedding: Vec<f32>, tags: &[&str]) -> StoredEntry {
    StoredEntry::new(
        content.to_string(),
        embedding,
        tags.iter().map(|t| t.to_string()).collect(),
        Some(format!("{content}.txt")),
    )
}

/// One recorded `generate_text` call.
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub prompt: String,
    pub options: GenerationOptions,
}

/// Scripted text generator. The first rule whose needle occurs in the prompt
/// decides the reply; unmatched prompts get `"generic reply"`.
///
/// Prompts matching a barrier needle wait on the barrier before replying, and
/// prompts matching a hold needle wait until the `Notify` is signalled.
#[derive(Default)]
pub struct FakeGenerator {
    rules: Vec<(String, Result<String, String>)>,
    barrier: Option<(String, Arc<Barrier>)>,
    hold: Option<(String, Arc<Notify>)>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, needle: &str, text: &str) -> Self {
        self.rules.push((needle.to_string(), Ok(text.to_string())));
        self
    }

    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Err(message.to_string())));
        self
    }

    pub fn barrier(mut self, needle: &str, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some((needle.to_string(), barrier));
        self
    }

    pub fn hold(mut self, needle: &str, release: Arc<Notify>) -> Self {
        self.hold = Some((needle.to_string(), release));
        self
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose prompt contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> Vec<GenerateCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.prompt.contains(needle))
            .collect()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String, ApiError> {
        self.calls.lock().unwrap().push(GenerateCall {
            prompt: prompt.to_string(),
            options: options.clone(),
        });
        if let Some((needle, barrier)) = &self.barrier {
            if prompt.contains(needle.as_str()) {
                barrier.wait().await;
            }
        }
        if let Some((needle, release)) = &self.hold {
            if prompt.contains(needle.as_str()) {
                release.notified().await;
            }
        }
        match self.rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            Some((_, Ok(text))) => Ok(text.clone()),
            Some((_, Err(message))) => Err(ApiError::Status {
                status: 500,
                body: message.clone(),
            }),
            None => Ok("generic reply".to_string()),
        }
    }
}

/// Scripted embedder. Texts containing a registered needle get its vector;
/// everything else gets `test_embedding(0)`.
#[derive(Default)]
pub struct FakeEmbedder {
    rules: Vec<(String, Vec<f32>)>,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.rules.push((needle.to_string(), vector));
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(ApiError::EmptyResponse);
        }
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| test_embedding(0)))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_id(&self) -> &str {
        "fake-embedder"
    }
}
