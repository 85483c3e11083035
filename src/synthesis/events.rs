//! Caller-facing progress events.
//!
//! One run emits, in order: `plans`, `context`, `synthesis-start`, `thought`,
//! optionally `memory`, then exactly one of `done` or `error`. Serialized as
//! `{"type": ..., "payload": ...}`.

use serde::Serialize;
use tokio::sync::mpsc;

use super::{AgentPlan, Stage};
use crate::memory::types::MemoryDraft;

/// Enough room for every event of one run, so a caller may await the run before
/// draining the receiver.
pub const EVENT_BUFFER: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    /// Joined engram text, or `None` when nothing was retrieved.
    pub context: Option<String>,
    /// The optimized query used for retrieval.
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailureReport {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum SynthesisEvent {
    Plans(Vec<AgentPlan>),
    Context(RetrievedContext),
    SynthesisStart,
    Thought(String),
    Memory(MemoryDraft),
    Done,
    Error(StageFailureReport),
}

impl SynthesisEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plans(_) => "plans",
            Self::Context(_) => "context",
            Self::SynthesisStart => "synthesis-start",
            Self::Thought(_) => "thought",
            Self::Memory(_) => "memory",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }
}

pub fn event_channel() -> (mpsc::Sender<SynthesisEvent>, mpsc::Receiver<SynthesisEvent>) {
    mpsc::channel(EVENT_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_and_payload() {
        let json = serde_json::to_value(SynthesisEvent::Thought("hi".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "thought", "payload": "hi" }));

        let json = serde_json::to_value(SynthesisEvent::SynthesisStart).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "synthesis-start" }));

        let json = serde_json::to_value(SynthesisEvent::Context(RetrievedContext {
            context: None,
            query: "q".into(),
        }))
        .unwrap();
        assert_eq!(json["payload"]["context"], serde_json::Value::Null);
        assert_eq!(json["payload"]["query"], "q");
    }

    #[test]
    fn error_payload_carries_stage() {
        let event = SynthesisEvent::Error(StageFailureReport {
            stage: Stage::Planning,
            message: "boom".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["stage"], "planning");
        assert_eq!(event.kind(), "error");
    }
}
