//! Collaborative synthesis pipeline.
//!
//! [`Orchestrator::run`] takes one query through five stages:
//!
//! 1. **Planning**: every persona in [`prompts::PERSONAS`] reacts to the query,
//!    concurrently. Plans are reported in persona order.
//! 2. **Query optimization**: the plans are folded into one retrieval query.
//! 3. **Retrieval**: tag-filtered similarity search over the knowledge base. Skipped
//!    entirely when the filtered pool is empty.
//! 4. **Synthesis**: query, plans, and context become the final thought.
//! 5. **Memory extraction** (opt-in): the final thought is distilled into a
//!    [`MemoryDraft`].
//!
//! Progress is streamed as [`SynthesisEvent`]s in stage order. A failure in stages
//! 1-4 aborts the run with a [`RunError`] tagged by stage; a failure in stage 5 is
//! reported but leaves the already delivered thought intact. Nothing is retried.

pub mod events;
pub mod prompts;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::SynthesisConfig;
use crate::llm::{ApiError, Embedder, GenerationOptions, TextGenerator};
use crate::memory::parse::parse_memory_point;
use crate::memory::types::MemoryDraft;
use crate::store::{StoreError, TagFilter, VectorStore};
use events::{RetrievedContext, StageFailureReport, SynthesisEvent};
use prompts::{Persona, PERSONAS};

/// Separator placed between retrieved engrams in the context text.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// One persona's reaction to the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPlan {
    pub module_name: String,
    pub plan: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    QueryOptimization,
    Retrieval,
    Synthesis,
    MemoryExtraction,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::QueryOptimization => "query_optimization",
            Self::Retrieval => "retrieval",
            Self::Synthesis => "synthesis",
            Self::MemoryExtraction => "memory_extraction",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("event receiver closed")]
    Cancelled,
}

/// A run aborted in `stage`.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: StageFailure,
}

impl RunError {
    fn new(stage: Stage, source: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            source: StageFailure::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, StageFailure::Cancelled)
    }
}

/// What the caller asks for.
#[derive(Debug, Clone, Default)]
pub struct SynthesisRequest {
    pub query: String,
    pub tags: TagFilter,
    pub request_memory: bool,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRun {
    pub query: String,
    pub tags: Vec<String>,
    pub plans: Vec<AgentPlan>,
    pub optimized_query: String,
    pub context: Option<String>,
    pub final_thought: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryDraft>,
    /// Set when memory extraction was requested but failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_error: Option<String>,
}

pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: SynthesisConfig,
    personas: &'static [Persona],
}

/// `"{name}: {plan}"` lines, for the query optimizer.
pub fn plans_for_optimizer(plans: &[AgentPlan]) -> String {
    plans
        .iter()
        .map(|p| format!("{}: {}", p.module_name, p.plan))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `"- {name}: {plan}"` lines, for the synthesizer.
pub fn plans_for_synthesis(plans: &[AgentPlan]) -> String {
    plans
        .iter()
        .map(|p| format!("- {}: {}", p.module_name, p.plan))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: SynthesisConfig,
    ) -> Self {
        Self {
            generator,
            embedder,
            store,
            settings,
            personas: PERSONAS,
        }
    }

    /// Run all stages, streaming progress into `events`, and finish the stream with
    /// `done` or `error`. A dropped receiver stops the run at the next stage boundary.
    pub async fn run(
        &self,
        request: SynthesisRequest,
        events: &mpsc::Sender<SynthesisEvent>,
    ) -> Result<SynthesisRun, RunError> {
        tracing::info!(
            query_len = request.query.len(),
            tags = request.tags.tags().len(),
            request_memory = request.request_memory,
            "synthesis run started"
        );

        let result = self.run_stages(request, events).await;

        let terminal = match &result {
            Ok(run) => match &run.memory_error {
                Some(message) => Some(SynthesisEvent::Error(StageFailureReport {
                    stage: Stage::MemoryExtraction,
                    message: message.clone(),
                })),
                None => Some(SynthesisEvent::Done),
            },
            Err(e) if e.is_cancelled() => None,
            Err(e) => Some(SynthesisEvent::Error(StageFailureReport {
                stage: e.stage,
                message: e.source.to_string(),
            })),
        };

        match &result {
            Ok(_) => tracing::info!("synthesis run finished"),
            Err(e) if e.is_cancelled() => tracing::info!(stage = %e.stage, "synthesis run cancelled by caller"),
            Err(e) => tracing::error!(stage = %e.stage, error = %e.source, "synthesis run failed"),
        }

        if let Some(event) = terminal {
            // Nobody left to tell if this fails.
            let _ = events.send(event).await;
        }
        result
    }

    async fn emit(
        events: &mpsc::Sender<SynthesisEvent>,
        stage: Stage,
        event: SynthesisEvent,
    ) -> Result<(), RunError> {
        events
            .send(event)
            .await
            .map_err(|_| RunError::cancelled(stage))
    }

    fn ensure_listening(events: &mpsc::Sender<SynthesisEvent>, stage: Stage) -> Result<(), RunError> {
        if events.is_closed() {
            Err(RunError::cancelled(stage))
        } else {
            Ok(())
        }
    }

    async fn run_stages(
        &self,
        request: SynthesisRequest,
        events: &mpsc::Sender<SynthesisEvent>,
    ) -> Result<SynthesisRun, RunError> {
        let SynthesisRequest {
            query,
            tags,
            request_memory,
        } = request;

        // 1. Planning
        Self::ensure_listening(events, Stage::Planning)?;
        let plans = self
            .generate_plans(&query)
            .await
            .map_err(|e| RunError::new(Stage::Planning, e))?;
        tracing::debug!(plans = plans.len(), "plans generated");
        Self::emit(events, Stage::Planning, SynthesisEvent::Plans(plans.clone())).await?;

        // 2. Query optimization
        Self::ensure_listening(events, Stage::QueryOptimization)?;
        let optimized_query = self
            .optimize_query(&query, &plans)
            .await
            .map_err(|e| RunError::new(Stage::QueryOptimization, e))?;
        tracing::debug!(optimized_query = %optimized_query, "retrieval query optimized");

        // 3. Retrieval
        Self::ensure_listening(events, Stage::Retrieval)?;
        let context = self.retrieve(&optimized_query, &tags).await?;
        Self::emit(
            events,
            Stage::Retrieval,
            SynthesisEvent::Context(RetrievedContext {
                context: context.clone(),
                query: optimized_query.clone(),
            }),
        )
        .await?;

        // 4. Synthesis
        Self::emit(events, Stage::Synthesis, SynthesisEvent::SynthesisStart).await?;
        let final_thought = self
            .synthesize(&query, &plans, context.as_deref())
            .await
            .map_err(|e| RunError::new(Stage::Synthesis, e))?;
        Self::emit(events, Stage::Synthesis, SynthesisEvent::Thought(final_thought.clone())).await?;

        // 5. Memory extraction
        let mut memory = None;
        let mut memory_error = None;
        if request_memory {
            Self::ensure_listening(events, Stage::MemoryExtraction)?;
            match self.extract_memory(&final_thought).await {
                Ok(draft) => {
                    Self::emit(events, Stage::MemoryExtraction, SynthesisEvent::Memory(draft.clone())).await?;
                    memory = Some(draft);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "memory extraction failed");
                    memory_error = Some(e.to_string());
                }
            }
        }

        Ok(SynthesisRun {
            query,
            tags: tags.tags().to_vec(),
            plans,
            optimized_query,
            context,
            final_thought,
            memory,
            memory_error,
        })
    }

    /// Ask every persona concurrently; the first failure aborts the rest.
    async fn generate_plans(&self, query: &str) -> Result<Vec<AgentPlan>, ApiError> {
        let options = GenerationOptions {
            system_instruction: Some(prompts::SYSTEM_PROMPT_BASE.to_string()),
            temperature: Some(self.settings.plan_temperature),
        };
        let options = &options;

        try_join_all(self.personas.iter().map(|persona| async move {
            let text = self
                .generator
                .generate_text(&persona.render(query), options)
                .await?;
            Ok::<_, ApiError>(AgentPlan {
                module_name: persona.name.to_string(),
                plan: text.trim().to_string(),
            })
        }))
        .await
    }

    async fn optimize_query(&self, query: &str, plans: &[AgentPlan]) -> Result<String, StageFailure> {
        if self.settings.skip_optimization_when_empty
            && self.store.matching_count(&TagFilter::default()).await? == 0
        {
            tracing::debug!("knowledge base empty, skipping query optimization");
            return Ok(query.to_string());
        }

        let prompt = prompts::fill(
            prompts::QUERY_OPTIMIZER_PROMPT,
            &[("query", query), ("plans", plans_for_optimizer(plans).as_str())],
        );
        let text = self
            .generator
            .generate_text(&prompt, &GenerationOptions::default())
            .await?;
        Ok(text.trim().to_string())
    }

    async fn retrieve(&self, optimized_query: &str, tags: &TagFilter) -> Result<Option<String>, RunError> {
        let fail = |e: StageFailure| RunError::new(Stage::Retrieval, e);

        let pool = self
            .store
            .matching_count(tags)
            .await
            .map_err(|e| fail(e.into()))?;
        if pool == 0 {
            tracing::info!(tags = ?tags.tags(), "no candidate engrams, skipping retrieval");
            return Ok(None);
        }

        let vector = self
            .embedder
            .embed(optimized_query)
            .await
            .map_err(|e| fail(e.into()))?;
        let hits = self
            .store
            .search(&vector, self.settings.retrieval_limit, tags)
            .await
            .map_err(|e| fail(e.into()))?;

        tracing::info!(pool, hits = hits.len(), "engrams retrieved");
        if hits.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            hits.into_iter()
                .map(|h| h.content)
                .collect::<Vec<_>>()
                .join(CONTEXT_SEPARATOR),
        ))
    }

    async fn synthesize(&self, query: &str, plans: &[AgentPlan], context: Option<&str>) -> Result<String, ApiError> {
        let prompt = prompts::fill(
            prompts::SYNTHESIZER_PROMPT,
            &[
                ("query", query),
                ("plans", plans_for_synthesis(plans).as_str()),
                ("context", context.unwrap_or(prompts::NO_CONTEXT_PLACEHOLDER)),
            ],
        );
        let text = self
            .generator
            .generate_text(&prompt, &GenerationOptions::with_temperature(self.settings.synthesis_temperature))
            .await?;
        Ok(text.trim().to_string())
    }

    async fn extract_memory(&self, final_thought: &str) -> Result<MemoryDraft, ApiError> {
        let prompt = prompts::fill(prompts::MEMORY_GENERATOR_PROMPT, &[("thought", final_thought)]);
        let raw = self
            .generator
            .generate_text(&prompt, &GenerationOptions::default())
            .await?;
        Ok(parse_memory_point(&raw))
    }
}
