//! MCP `forget_memory_point` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `forget_memory_point` MCP tool.
///
/// Provide either `id` or `all = true`, not both.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ForgetMemoryPointParams {
    /// ID of the memory point to delete.
    #[schemars(description = "ID of the memory point to delete. Required unless 'all' is true.")]
    pub id: Option<String>,

    /// Delete every stored memory point.
    #[schemars(description = "If true, delete every stored memory point. Requires confirm=true.")]
    pub all: Option<bool>,

    /// Must be `true` for the deletion to proceed.
    #[schemars(description = "Must be true to execute the deletion (safety gate)")]
    pub confirm: bool,
}
