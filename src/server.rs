//! Server initialization for the HTTP (SSE) API and the MCP stdio transport.
//!
//! [`setup_shared_state`] wires the database, hosted API client, and vector store
//! into an [`AppState`] shared by every entry point, including the CLI.

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use rmcp::ServiceExt;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};

use mem42::config::Mem42Config;
use mem42::db;
use mem42::ingest::{parse_tags, Document, Ingestor};
use mem42::llm::{self, Embedder, TextGenerator};
use mem42::memory::store as memory_store;
use mem42::memory::types::MemoryPoint;
use mem42::store::{self, TagFilter, VectorStore};
use mem42::synthesis::events::{event_channel, SynthesisEvent};
use mem42::synthesis::{Orchestrator, RunError, SynthesisRequest, SynthesisRun};

use crate::tools::Mem42Tools;

/// Handles shared by the HTTP server, the MCP tools, and the CLI.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub generator: Arc<dyn TextGenerator>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub config: Arc<Mem42Config>,
}

impl AppState {
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
            self.config.synthesis.clone(),
        )
    }

    pub fn ingestor(&self) -> Ingestor<'_> {
        Ingestor {
            generator: self.generator.as_ref(),
            embedder: self.embedder.as_ref(),
            store: self.store.as_ref(),
            engram_temperature: self.config.synthesis.engram_temperature,
        }
    }

    /// Run a closure against the database on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&conn)
        })
        .await
        .context("db task failed")?
    }

    /// Run a synthesis and persist the memory point it produced, if any.
    pub async fn think(
        &self,
        request: SynthesisRequest,
        events: &tokio::sync::mpsc::Sender<SynthesisEvent>,
    ) -> Result<(SynthesisRun, Option<MemoryPoint>), RunError> {
        let run = self.orchestrator().run(request, events).await?;

        let point = match &run.memory {
            Some(draft) => {
                let point = MemoryPoint::from_draft(
                    draft.clone(),
                    run.query.clone(),
                    run.final_thought.clone(),
                );
                let to_save = point.clone();
                match self
                    .with_db(move |conn| memory_store::save_memory_point(conn, &to_save))
                    .await
                {
                    Ok(()) => Some(point),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to persist memory point");
                        None
                    }
                }
            }
            None => None,
        };

        Ok((run, point))
    }
}

/// Shared setup: open DB, create API client and vector store, check the embedding model.
pub fn setup_shared_state(config: Mem42Config) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let (generator, embedder) =
        llm::create_client(&config.generation).context("failed to create API client")?;

    match db::migrations::get_embedding_model(&conn)? {
        Some(stored) if stored != embedder.model_id() => {
            tracing::warn!(
                stored = %stored,
                configured = %embedder.model_id(),
                "embedding model changed, run `mem42 clear` and re-ingest documents"
            );
        }
        Some(_) => {}
        None => db::migrations::set_embedding_model(&conn, embedder.model_id())?,
    }

    if let Some(stored) = db::migrations::get_vector_dimension(&conn)? {
        if stored != embedder.dimensions() {
            tracing::warn!(
                stored,
                configured = embedder.dimensions(),
                "vector dimension changed, run `mem42 clear` and re-ingest documents"
            );
        }
    }

    let db = Arc::new(Mutex::new(conn));
    let store = store::create_store(&config, Arc::clone(&db))?;
    tracing::info!(backend = %config.storage.backend, "vector store ready");

    Ok(AppState {
        db,
        generator,
        embedder,
        store,
        config: Arc::new(config),
    })
}

/// JSON error response for HTTP handlers.
struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(error: anyhow::Error) -> Self {
        tracing::error!(error = %error, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{error:#}"))
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    query: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    request_memory: bool,
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    documents: Vec<Document>,
    #[serde(default)]
    tags: String,
}

async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiFailure> {
    if params.query.trim().is_empty() {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "query must not be empty"));
    }

    let request = SynthesisRequest {
        query: params.query,
        tags: TagFilter::new(parse_tags(&params.tags)),
        request_memory: params.request_memory,
    };

    let (tx, rx) = event_channel();
    tokio::spawn(async move {
        // Errors are already streamed to the client as an `error` event.
        let _ = state.think(request, &tx).await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Event::default().json_data(&event), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn upload_handler(
    State(state): State<AppState>,
    Json(upload): Json<UploadRequest>,
) -> impl IntoResponse {
    let tags = parse_tags(&upload.tags);
    tracing::info!(documents = upload.documents.len(), tags = ?tags, "upload received");
    let report = state.ingestor().ingest_batch(&upload.documents, &tags).await;
    Json(report)
}

async fn engram_count_handler(State(state): State<AppState>) -> impl IntoResponse {
    let count = match state.store.collection_info().await {
        Ok(info) => info.point_count,
        Err(e) => {
            tracing::warn!(error = %e, "could not fetch collection info");
            0
        }
    };
    Json(json!({ "count": count }))
}

async fn clear_knowledge_handler(State(state): State<AppState>) -> Response {
    let cleared = store::clear_knowledge(
        state.store.as_ref(),
        &state.db,
        state.embedder.dimensions(),
        state.embedder.model_id(),
    )
    .await;
    match cleared {
        Ok(()) => Json(json!({ "message": "Knowledge base cleared successfully." })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to clear knowledge base");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Failed to clear knowledge base.", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn list_memories_handler(State(state): State<AppState>) -> Result<Json<Vec<MemoryPoint>>, ApiFailure> {
    state
        .with_db(memory_store::list_memory_points)
        .await
        .map(Json)
        .map_err(ApiFailure::internal)
}

async fn get_memory_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MemoryPoint>, ApiFailure> {
    let target = id.clone();
    state
        .with_db(move |conn| memory_store::get_memory_point(conn, &target))
        .await
        .map_err(ApiFailure::internal)?
        .map(Json)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, format!("memory point not found: {id}")))
}

async fn delete_memory_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let target = id.clone();
    let deleted = state
        .with_db(move |conn| memory_store::delete_memory_point(conn, &target))
        .await
        .map_err(ApiFailure::internal)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiFailure::new(StatusCode::NOT_FOUND, format!("memory point not found: {id}")))
    }
}

async fn clear_memories_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiFailure> {
    let deleted = state
        .with_db(memory_store::clear_memory_points)
        .await
        .map_err(ApiFailure::internal)?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/query", get(query_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/engram-count", get(engram_count_handler))
        .route("/api/clear-knowledge", post(clear_knowledge_handler))
        .route(
            "/api/memories",
            get(list_memories_handler).delete(clear_memories_handler),
        )
        .route(
            "/api/memories/{id}",
            get(get_memory_handler).delete(delete_memory_handler),
        )
        .with_state(state)
}

/// Start the HTTP API.
pub async fn serve_http(config: Mem42Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting mem42 HTTP server");

    let state = setup_shared_state(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "mem42 listening at http://{bind_addr}/api");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}

/// Start the MCP server over stdio transport.
pub async fn serve_mcp(config: Mem42Config) -> Result<()> {
    tracing::info!("starting mem42 MCP server on stdio");

    let state = setup_shared_state(config)?;
    let tools = Mem42Tools::new(state);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
