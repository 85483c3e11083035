//! MCP `knowledge_stats` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `knowledge_stats` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeStatsParams {
    /// Count only engrams matching these comma-separated tags.
    #[schemars(description = "Comma-separated tags. If given, also report how many engrams match them.")]
    pub tags: Option<String>,
}
