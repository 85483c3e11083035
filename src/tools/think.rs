//! MCP `think` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `think` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ThinkParams {
    /// The question or topic to reason about.
    #[schemars(description = "The question or topic to reason about")]
    pub query: String,

    /// Comma-separated tags restricting which engrams may be retrieved.
    #[schemars(
        description = "Comma-separated tags. Only engrams whose tags contain every given tag are used as context. Omit to search the whole knowledge base."
    )]
    pub tags: Option<String>,

    /// Distill the answer into a stored memory point. Defaults to false.
    #[schemars(
        description = "If true, distill the final answer into a memory point (summary, tags, image prompt) and store it. Defaults to false."
    )]
    pub request_memory: Option<bool>,
}
