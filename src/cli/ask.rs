//! CLI `ask` command: run one synthesis and stream its progress to the terminal.

use anyhow::{Context, Result};

use mem42::config::Mem42Config;
use mem42::ingest::parse_tags;
use mem42::memory::types::MemoryPoint;
use mem42::store::TagFilter;
use mem42::synthesis::events::{event_channel, SynthesisEvent};
use mem42::synthesis::{RunError, SynthesisRequest, SynthesisRun};

/// Run the full pipeline for `query` and print each stage as it completes.
pub async fn ask(config: Mem42Config, query: &str, tags: Option<&str>, request_memory: bool) -> Result<()> {
    anyhow::ensure!(!query.trim().is_empty(), "query must not be empty");

    let state = crate::server::setup_shared_state(config)?;
    let request = SynthesisRequest {
        query: query.to_string(),
        tags: TagFilter::new(parse_tags(tags.unwrap_or(""))),
        request_memory,
    };

    let (tx, mut rx) = event_channel();
    let runner = {
        let state = state.clone();
        tokio::spawn(async move { state.think(request, &tx).await })
    };

    while let Some(event) = rx.recv().await {
        print_event(&event);
    }

    let outcome = runner.await.context("synthesis task failed")?;
    if let Some(point) = finish(outcome)? {
        println!("Memory point saved: {}", point.id);
    }
    Ok(())
}

/// The failing stage has already been printed from its `error` event, so a
/// failed run only needs a short exit error.
fn finish(
    outcome: Result<(SynthesisRun, Option<MemoryPoint>), RunError>,
) -> Result<Option<MemoryPoint>> {
    match outcome {
        Ok((_, point)) => Ok(point),
        Err(e) => {
            tracing::debug!(error = %e, "synthesis run failed");
            anyhow::bail!("synthesis failed")
        }
    }
}

fn print_event(event: &SynthesisEvent) {
    match event {
        SynthesisEvent::Plans(plans) => {
            println!("Agent Plans");
            println!("{}", "=".repeat(40));
            for plan in plans {
                println!("  {}: {}", plan.module_name, plan.plan);
            }
            println!();
        }
        SynthesisEvent::Context(retrieved) => {
            println!("Retrieval query: {}", retrieved.query);
            match &retrieved.context {
                Some(context) => println!("Context retrieved ({} chars)\n", context.len()),
                None => println!("No context retrieved\n"),
            }
        }
        SynthesisEvent::SynthesisStart => {
            println!("Synthesizing...\n");
        }
        SynthesisEvent::Thought(thought) => {
            println!("{thought}\n");
        }
        SynthesisEvent::Memory(draft) => {
            println!("Memory Point");
            println!("{}", "=".repeat(40));
            println!("Summary:\n{}\n", draft.summary);
            println!("Tags: {}", draft.tags.join(", "));
            println!("Image prompt: {}\n", draft.image_prompt);
        }
        SynthesisEvent::Done => {}
        SynthesisEvent::Error(report) => {
            eprintln!("Error in {} stage: {}", report.stage, report.message);
        }
    }
}
