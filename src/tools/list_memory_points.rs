//! MCP `list_memory_points` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `list_memory_points` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListMemoryPointsParams {
    /// Maximum number of memory points to return, newest first.
    #[schemars(description = "Maximum number of memory points to return, newest first. Defaults to all.")]
    pub limit: Option<usize>,
}
