//! Memory point types.
//!
//! A [`MemoryDraft`] is what the extraction stage produces from a synthesized answer;
//! the caller turns it into a [`MemoryPoint`] by attaching an id and the original
//! thought before persisting it.

use serde::{Deserialize, Serialize};

/// Summary, tags, and image prompt extracted from one synthesized answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDraft {
    pub summary: String,
    pub tags: Vec<String>,
    pub image_prompt: String,
}

/// A durable distillation of one synthesized answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPoint {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// The user query that started the run. Absent on points stored before
    /// queries were recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// The final thought this memory was extracted from.
    pub original_thought: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub image_prompt: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl MemoryPoint {
    pub fn from_draft(
        draft: MemoryDraft,
        query: impl Into<String>,
        original_thought: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            query: Some(query.into()),
            original_thought: original_thought.into(),
            summary: draft.summary,
            tags: draft.tags,
            image_prompt: draft.image_prompt,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
