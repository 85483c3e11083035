mod helpers;

use helpers::{entry, test_embedding, test_store, FakeEmbedder, FakeGenerator};
use mem42::config::SynthesisConfig;
use mem42::llm::{Embedder, TextGenerator};
use mem42::store::{TagFilter, VectorStore};
use mem42::synthesis::events::{event_channel, SynthesisEvent};
use mem42::synthesis::prompts::NO_CONTEXT_PLACEHOLDER;
use mem42::synthesis::{Orchestrator, Stage, SynthesisRequest, CONTEXT_SEPARATOR};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Barrier, Notify};

const OPTIMIZER: &str = "Memory Philosopher";
const SYNTHESIZER: &str = "You are the Synthesizer";
const MEMORY: &str = "Memory Point Generator";

/// A generator with a reply for every stage.
fn scripted() -> FakeGenerator {
    FakeGenerator::new()
        .reply(OPTIMIZER, "  optimized query \n")
        .reply(SYNTHESIZER, "  The final thought.  ")
        .reply(
            MEMORY,
            "Summary:\nA short summary.\nTags:\nalpha, beta\nImage Prompt:\nA lighthouse at dusk.",
        )
        .reply("Your persona is the Logic Module", " logic plan ")
        .reply("Your persona is the Creativity Module", "creative plan")
        .reply("Your persona is the Critical Module", "critical plan")
        .reply("Your persona is the Planning Module", "planning plan")
        .reply("Your persona is the Ethical Module", "ethical plan")
}

fn request(query: &str, tags: &[&str], request_memory: bool) -> SynthesisRequest {
    SynthesisRequest {
        query: query.to_string(),
        tags: TagFilter::new(tags.iter().copied()),
        request_memory,
    }
}

fn orchestrator(
    generator: &Arc<FakeGenerator>,
    embedder: &Arc<FakeEmbedder>,
    store: Arc<dyn VectorStore>,
    settings: SynthesisConfig,
) -> Orchestrator {
    let generator: Arc<dyn TextGenerator> = generator.clone();
    let embedder: Arc<dyn Embedder> = embedder.clone();
    Orchestrator::new(generator, embedder, store, settings)
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<SynthesisEvent>) -> Vec<SynthesisEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn kinds(events: &[SynthesisEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

#[tokio::test]
async fn events_arrive_in_stage_order() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, rx) = event_channel();
    let run = orch.run(request("why?", &[], false), &tx).await.unwrap();
    drop(tx);
    let events = drain(rx).await;

    assert_eq!(kinds(&events), vec!["plans", "context", "synthesis-start", "thought", "done"]);

    match &events[0] {
        SynthesisEvent::Plans(plans) => {
            let names: Vec<_> = plans.iter().map(|p| p.module_name.as_str()).collect();
            assert_eq!(
                names,
                vec!["Logic Module", "Creativity Module", "Critical Module", "Planning Module", "Ethical Module"]
            );
            assert_eq!(plans[0].plan, "logic plan");
        }
        other => panic!("expected plans, got {other:?}"),
    }
    match &events[3] {
        SynthesisEvent::Thought(text) => assert_eq!(text, "The final thought."),
        other => panic!("expected thought, got {other:?}"),
    }

    assert_eq!(run.optimized_query, "optimized query");
    assert_eq!(run.final_thought, "The final thought.");
    assert!(run.memory.is_none());
}

#[tokio::test]
async fn retrieval_joins_top_matches_in_rank_order() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new().vector("optimized query", test_embedding(1)));
    let (_db, store) = test_store();

    let mut closest = test_embedding(1);
    closest[2] = 0.1;
    let mut second = test_embedding(1);
    second[2] = 0.5;
    let mut third = test_embedding(1);
    third[2] = 1.0;
    store.upsert(entry("third", third, &[])).await.unwrap();
    store.upsert(entry("closest", closest, &[])).await.unwrap();
    store.upsert(entry("unrelated", test_embedding(5), &[])).await.unwrap();
    store.upsert(entry("second", second, &[])).await.unwrap();

    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());
    let (tx, rx) = event_channel();
    let run = orch.run(request("q", &[], false), &tx).await.unwrap();
    drop(tx);
    let events = drain(rx).await;

    let expected = ["closest", "second", "third"].join(CONTEXT_SEPARATOR);
    assert_eq!(run.context.as_deref(), Some(expected.as_str()));
    assert_eq!(embedder.calls(), vec!["optimized query".to_string()]);

    match &events[1] {
        SynthesisEvent::Context(ctx) => {
            assert_eq!(ctx.context.as_deref(), Some(expected.as_str()));
            assert_eq!(ctx.query, "optimized query");
        }
        other => panic!("expected context, got {other:?}"),
    }

    let synth = generator.calls_matching(SYNTHESIZER);
    assert_eq!(synth.len(), 1);
    assert!(synth[0].prompt.contains(&expected));
    assert!(synth[0].prompt.contains("- Logic Module: logic plan"));
}

#[tokio::test]
async fn tag_filter_with_no_candidates_skips_embedding() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    store
        .upsert(entry("finance doc", test_embedding(0), &["finance"]))
        .await
        .unwrap();

    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());
    let (tx, rx) = event_channel();
    let run = orch.run(request("q", &["marketing"], false), &tx).await.unwrap();
    drop(tx);
    let events = drain(rx).await;

    assert!(run.context.is_none());
    assert!(embedder.calls().is_empty(), "no embedding when the pool is empty");
    assert!(matches!(
        &events[1],
        SynthesisEvent::Context(ctx) if ctx.context.is_none()
    ));

    let synth = generator.calls_matching(SYNTHESIZER);
    assert!(synth[0].prompt.contains(NO_CONTEXT_PLACEHOLDER));
}

#[tokio::test]
async fn tag_filter_restricts_context_to_matching_engrams() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new().vector("optimized query", test_embedding(3)));
    let (_db, store) = test_store();
    store
        .upsert(entry("exact but untagged", test_embedding(3), &[]))
        .await
        .unwrap();
    store
        .upsert(entry("q3 finance report", test_embedding(4), &["Finance-2024", "q3"]))
        .await
        .unwrap();

    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());
    let (tx, _rx) = event_channel();
    let run = orch.run(request("q", &["finance", "Q3"], false), &tx).await.unwrap();

    assert_eq!(run.context.as_deref(), Some("q3 finance report"));
    assert_eq!(run.tags, vec!["finance", "q3"]);
}

#[tokio::test]
async fn planning_failure_emits_only_error() {
    let generator = Arc::new(
        FakeGenerator::new()
            .fail("Your persona is the Critical Module", "quota exceeded")
            .reply(OPTIMIZER, "unused"),
    );
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, rx) = event_channel();
    let err = orch.run(request("q", &[], true), &tx).await.unwrap_err();
    drop(tx);
    let events = drain(rx).await;

    assert_eq!(err.stage, Stage::Planning);
    assert_eq!(kinds(&events), vec!["error"]);
    match &events[0] {
        SynthesisEvent::Error(report) => {
            assert_eq!(report.stage, Stage::Planning);
            assert!(report.message.contains("quota exceeded"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(generator.calls_matching(OPTIMIZER).is_empty());
}

#[tokio::test]
async fn synthesis_failure_stops_after_synthesis_start() {
    let generator = Arc::new(
        FakeGenerator::new()
            .fail(SYNTHESIZER, "overloaded")
            .reply(OPTIMIZER, "optimized query"),
    );
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, rx) = event_channel();
    let err = orch.run(request("q", &[], true), &tx).await.unwrap_err();
    drop(tx);
    let events = drain(rx).await;

    assert_eq!(err.stage, Stage::Synthesis);
    assert_eq!(kinds(&events), vec!["plans", "context", "synthesis-start", "error"]);
    assert!(generator.calls_matching(MEMORY).is_empty());
}

#[tokio::test]
async fn retrieval_failure_is_tagged_retrieval() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::failing());
    let (_db, store) = test_store();
    store.upsert(entry("doc", test_embedding(0), &[])).await.unwrap();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, rx) = event_channel();
    let err = orch.run(request("q", &[], false), &tx).await.unwrap_err();
    drop(tx);
    let events = drain(rx).await;

    assert_eq!(err.stage, Stage::Retrieval);
    assert_eq!(kinds(&events), vec!["plans", "error"]);
}

#[tokio::test]
async fn memory_extraction_emits_memory_then_done() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, rx) = event_channel();
    let run = orch.run(request("q", &[], true), &tx).await.unwrap();
    drop(tx);
    let events = drain(rx).await;

    assert_eq!(
        kinds(&events),
        vec!["plans", "context", "synthesis-start", "thought", "memory", "done"]
    );
    let memory = run.memory.unwrap();
    assert_eq!(memory.summary, "A short summary.");
    assert_eq!(memory.tags, vec!["alpha", "beta"]);
    assert_eq!(memory.image_prompt, "A lighthouse at dusk.");
    assert!(run.memory_error.is_none());

    let extraction = generator.calls_matching(MEMORY);
    assert_eq!(extraction.len(), 1);
    assert!(extraction[0].prompt.contains("The final thought."));
}

#[tokio::test]
async fn memory_failure_keeps_thought() {
    let generator = Arc::new(
        FakeGenerator::new()
            .fail(MEMORY, "safety block")
            .reply(OPTIMIZER, "optimized query")
            .reply(SYNTHESIZER, "The final thought."),
    );
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, rx) = event_channel();
    let run = orch.run(request("q", &[], true), &tx).await.unwrap();
    drop(tx);
    let events = drain(rx).await;

    assert_eq!(
        kinds(&events),
        vec!["plans", "context", "synthesis-start", "thought", "error"]
    );
    assert_eq!(run.final_thought, "The final thought.");
    assert!(run.memory.is_none());
    assert!(run.memory_error.unwrap().contains("safety block"));
    match events.last() {
        Some(SynthesisEvent::Error(report)) => assert_eq!(report.stage, Stage::MemoryExtraction),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn closed_receiver_cancels_before_any_call() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, rx) = event_channel();
    drop(rx);
    let err = orch.run(request("q", &[], true), &tx).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn persona_calls_run_concurrently() {
    // Every persona call waits until all five are in flight, so issuing them one
    // after another never completes.
    let barrier = Arc::new(Barrier::new(5));
    let generator = Arc::new(scripted().barrier("Your persona is the", barrier));
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, _rx) = event_channel();
    let run = tokio::time::timeout(Duration::from_secs(5), orch.run(request("q", &[], false), &tx))
        .await
        .expect("planning calls must not wait for each other")
        .unwrap();

    assert_eq!(run.plans.len(), 5);
    assert_eq!(generator.calls_matching("Your persona is the").len(), 5);
}

#[tokio::test]
async fn receiver_dropped_mid_run_stops_later_stages() {
    let release = Arc::new(Notify::new());
    let generator = Arc::new(scripted().hold(OPTIMIZER, Arc::clone(&release)));
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    store.upsert(entry("doc", test_embedding(0), &[])).await.unwrap();
    let orch = orchestrator(&generator, &embedder, store, SynthesisConfig::default());

    let (tx, mut rx) = event_channel();
    let runner = tokio::spawn(async move { orch.run(request("q", &[], true), &tx).await });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind(), "plans");
    drop(rx);
    release.notify_one();

    let err = runner.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(err.stage, Stage::QueryOptimization | Stage::Retrieval));
    assert!(embedder.calls().is_empty());
    assert!(generator.calls_matching(SYNTHESIZER).is_empty());
    assert!(generator.calls_matching(MEMORY).is_empty());
}

#[tokio::test]
async fn stage_temperatures_follow_settings() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let settings = SynthesisConfig::default();
    let orch = orchestrator(&generator, &embedder, store, settings.clone());

    let (tx, _rx) = event_channel();
    orch.run(request("q", &[], true), &tx).await.unwrap();

    let plans = generator.calls_matching("Your persona is the");
    assert_eq!(plans.len(), 5);
    for call in &plans {
        assert_eq!(call.options.temperature, Some(settings.plan_temperature));
        assert!(call.options.system_instruction.is_some());
    }

    let optimizer = generator.calls_matching(OPTIMIZER);
    assert_eq!(optimizer[0].options.temperature, None);

    let synth = generator.calls_matching(SYNTHESIZER);
    assert_eq!(synth[0].options.temperature, Some(settings.synthesis_temperature));
    assert!(synth[0].options.system_instruction.is_none());

    let memory = generator.calls_matching(MEMORY);
    assert_eq!(memory[0].options.temperature, None);
}

#[tokio::test]
async fn optimization_can_be_skipped_for_empty_store() {
    let generator = Arc::new(scripted());
    let embedder = Arc::new(FakeEmbedder::new());
    let (_db, store) = test_store();
    let settings = SynthesisConfig {
        skip_optimization_when_empty: true,
        ..SynthesisConfig::default()
    };
    let orch = orchestrator(&generator, &embedder, store, settings);

    let (tx, _rx) = event_channel();
    let run = orch.run(request("raw question", &[], false), &tx).await.unwrap();

    assert_eq!(run.optimized_query, "raw question");
    assert!(generator.calls_matching(OPTIMIZER).is_empty());
}
