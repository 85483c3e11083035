//! Document ingestion: distill each document into an engram, embed it, and store it.
//!
//! Documents in a batch are processed one after another; a failure is recorded
//! against that document and the batch carries on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{ApiError, Embedder, GenerationOptions, TextGenerator};
use crate::store::{StoreError, StoredEntry, VectorStore};
use crate::synthesis::prompts;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document is empty")]
    EmptyDocument,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One document to ingest: its display name and extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub message: String,
    pub processed: usize,
    pub successful_uploads: usize,
    pub errors: Vec<String>,
    pub ids: Vec<String>,
}

/// Split a comma-separated tag string: trim, lowercase, drop empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub struct Ingestor<'a> {
    pub generator: &'a dyn TextGenerator,
    pub embedder: &'a dyn Embedder,
    pub store: &'a dyn VectorStore,
    pub engram_temperature: f32,
}

impl<'a> Ingestor<'a> {
    /// Distill a document into a dense engram.
    pub async fn create_engram(&self, text: &str) -> Result<String, IngestError> {
        if text.trim().is_empty() {
            return Err(IngestError::EmptyDocument);
        }
        let prompt = prompts::fill(prompts::ENGRAM_CREATION_PROMPT, &[("document", text)]);
        let engram = self
            .generator
            .generate_text(&prompt, &GenerationOptions::with_temperature(self.engram_temperature))
            .await?;
        Ok(engram.trim().to_string())
    }

    /// Engram, embed, and store one document. Returns the new entry id.
    pub async fn ingest_document(&self, document: &Document, tags: &[String]) -> Result<String, IngestError> {
        let engram = self.create_engram(&document.text).await?;
        let embedding = self.embedder.embed(&engram).await?;
        let entry = StoredEntry::new(engram, embedding, tags.to_vec(), Some(document.name.clone()));
        let id = entry.id.clone();
        self.store.upsert(entry).await?;
        tracing::info!(id = %id, source = %document.name, tags = tags.len(), "engram stored");
        Ok(id)
    }

    /// Ingest every document, isolating failures per document.
    pub async fn ingest_batch(&self, documents: &[Document], tags: &[String]) -> IngestReport {
        let mut report = IngestReport {
            processed: documents.len(),
            ..Default::default()
        };

        for document in documents {
            match self.ingest_document(document, tags).await {
                Ok(id) => {
                    report.successful_uploads += 1;
                    report.ids.push(id);
                }
                Err(e) => {
                    tracing::error!(source = %document.name, error = %e, "failed to ingest document");
                    report.errors.push(format!("{}: {e}", document.name));
                }
            }
        }

        report.message = format!(
            "Processed {}/{} files.",
            report.successful_uploads, report.processed
        );
        report
    }
}
