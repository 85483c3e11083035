//! MCP `ingest_document` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ingest_document` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IngestDocumentParams {
    /// Display name of the document, stored as the engram's source.
    #[schemars(description = "Display name of the document (e.g. a file name)")]
    pub name: String,

    /// Full text of the document.
    #[schemars(description = "Full plain-text content of the document")]
    pub text: String,

    /// Comma-separated tags applied to the engram.
    #[schemars(description = "Comma-separated tags to attach to the engram (e.g. 'finance,q3-report')")]
    pub tags: Option<String>,
}
