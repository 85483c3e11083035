pub mod forget_memory_point;
pub mod ingest_document;
pub mod knowledge_stats;
pub mod list_memory_points;
pub mod think;

use forget_memory_point::ForgetMemoryPointParams;
use ingest_document::IngestDocumentParams;
use knowledge_stats::KnowledgeStatsParams;
use list_memory_points::ListMemoryPointsParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use think::ThinkParams;

use mem42::ingest::{parse_tags, Document};
use mem42::memory::store as memory_store;
use mem42::store::TagFilter;
use mem42::synthesis::events::event_channel;
use mem42::synthesis::SynthesisRequest;

use crate::server::AppState;

/// The mem42 MCP tool handler. Holds the shared [`AppState`] and exposes all MCP
/// tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct Mem42Tools {
    tool_router: ToolRouter<Self>,
    state: AppState,
}

#[tool_router]
impl Mem42Tools {
    pub fn new(state: AppState) -> Self {
        Self {
            tool_router: Self::tool_router(),
            state,
        }
    }

    /// Run the full collaborative synthesis for a query.
    #[tool(description = "Answer a query through collaborative synthesis: five specialist personas plan, the knowledge base is searched (optionally restricted by tags), and a final answer is synthesized. Optionally distills the answer into a stored memory point.")]
    async fn think(
        &self,
        Parameters(params): Parameters<ThinkParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }

        let request = SynthesisRequest {
            query: params.query,
            tags: TagFilter::new(parse_tags(params.tags.as_deref().unwrap_or(""))),
            request_memory: params.request_memory.unwrap_or(false),
        };
        tracing::info!(
            query_len = request.query.len(),
            tags = ?request.tags.tags(),
            "think called"
        );

        // The receiver must outlive the run, or the run is treated as cancelled.
        let (tx, _rx) = event_channel();
        let (run, point) = self
            .state
            .think(request, &tx)
            .await
            .map_err(|e| e.to_string())?;

        let mut body = serde_json::to_value(&run).map_err(|e| format!("serialization failed: {e}"))?;
        if let Some(point) = point {
            body["memoryPointId"] = serde_json::Value::String(point.id);
        }
        Ok(body.to_string())
    }

    /// Ingest one document into the knowledge base.
    #[tool(description = "Distill a document into a memory engram, embed it, and store it in the knowledge base with optional tags.")]
    async fn ingest_document(
        &self,
        Parameters(params): Parameters<IngestDocumentParams>,
    ) -> Result<String, String> {
        let tags = parse_tags(params.tags.as_deref().unwrap_or(""));
        let document = Document {
            name: params.name,
            text: params.text,
        };
        tracing::info!(source = %document.name, text_len = document.text.len(), "ingest_document called");

        let id = self
            .state
            .ingestor()
            .ingest_document(&document, &tags)
            .await
            .map_err(|e| format!("ingest failed: {e}"))?;

        Ok(serde_json::json!({
            "id": id,
            "source": document.name,
            "tags": tags,
        })
        .to_string())
    }

    /// Report knowledge base and memory point counts.
    #[tool(description = "Get knowledge base statistics: engram count, vector dimension, stored memory points, and optionally how many engrams match a tag filter.")]
    async fn knowledge_stats(
        &self,
        Parameters(params): Parameters<KnowledgeStatsParams>,
    ) -> Result<String, String> {
        tracing::info!("knowledge_stats called");
        let info = self
            .state
            .store
            .collection_info()
            .await
            .map_err(|e| format!("collection info failed: {e}"))?;

        let matching = match params.tags.as_deref() {
            Some(raw) => {
                let filter = TagFilter::new(parse_tags(raw));
                Some(
                    self.state
                        .store
                        .matching_count(&filter)
                        .await
                        .map_err(|e| format!("count failed: {e}"))?,
                )
            }
            None => None,
        };

        let memory_points = self
            .state
            .with_db(memory_store::count_memory_points)
            .await
            .map_err(|e| format!("db query failed: {e}"))?;

        Ok(serde_json::json!({
            "engrams": info.point_count,
            "dimension": info.dimension,
            "matching": matching,
            "memory_points": memory_points,
            "backend": self.state.config.storage.backend,
            "embedding_model": self.state.embedder.model_id(),
        })
        .to_string())
    }

    /// List stored memory points.
    #[tool(description = "List stored memory points (summary, tags, image prompt, original thought), newest first.")]
    async fn list_memory_points(
        &self,
        Parameters(params): Parameters<ListMemoryPointsParams>,
    ) -> Result<String, String> {
        tracing::info!(limit = ?params.limit, "list_memory_points called");
        let mut points = self
            .state
            .with_db(memory_store::list_memory_points)
            .await
            .map_err(|e| format!("db query failed: {e}"))?;
        if let Some(limit) = params.limit {
            points.truncate(limit);
        }

        serde_json::to_string(&points).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Delete one or all memory points.
    #[tool(description = "Delete a memory point by ID, or all memory points with all=true. Requires confirm=true as a safety gate.")]
    async fn forget_memory_point(
        &self,
        Parameters(params): Parameters<ForgetMemoryPointParams>,
    ) -> Result<String, String> {
        if !params.confirm {
            return Err("confirm must be true to delete memory points".into());
        }

        let all = params.all.unwrap_or(false);
        match (params.id, all) {
            (Some(_), true) => Err("provide either 'id' or 'all', not both".into()),
            (None, false) => Err("provide 'id' or set 'all' to true".into()),
            (None, true) => {
                let deleted = self
                    .state
                    .with_db(memory_store::clear_memory_points)
                    .await
                    .map_err(|e| format!("delete failed: {e}"))?;
                tracing::info!(deleted, "all memory points deleted");
                Ok(serde_json::json!({ "deleted": deleted }).to_string())
            }
            (Some(id), false) => {
                let target = id.clone();
                let deleted = self
                    .state
                    .with_db(move |conn| memory_store::delete_memory_point(conn, &target))
                    .await
                    .map_err(|e| format!("delete failed: {e}"))?;
                if !deleted {
                    return Err(format!("memory point not found: {id}"));
                }
                tracing::info!(id = %id, "memory point deleted");
                Ok(serde_json::json!({ "deleted": 1, "id": id }).to_string())
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for Mem42Tools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "mem42 is a collaborative synthesis engine. Use ingest_document to add knowledge, \
                 think to answer questions against it, and list_memory_points to review distilled memories."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
