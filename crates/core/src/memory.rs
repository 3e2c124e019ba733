//! Conversation memory — the append-only step history behind each agent.
//!
//! One `Step` records one completed turn: the model's output, the tool
//! calls it requested, and the result each call produced. Sibling agents
//! in a team may share a single memory, so implementations must support
//! concurrent append/read; `history()` always returns a snapshot, never
//! a live-mutating view.

use crate::message::ToolCall;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One completed turn of an agent loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    /// Who produced this step (agent name, or "user" for inputs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    /// The model's text output for this turn
    pub output: String,

    /// Tool calls requested during this turn, in order received.
    /// Tool-call ids are unique within one step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Tool-call id → result text. Replay follows `tool_calls` order,
    /// never map order.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tool_results: HashMap<String, String>,
}

impl Step {
    /// A plain text step with no tool activity.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }
}

/// The conversation memory trait.
///
/// Steps are append-only and ordering is significant: replay order equals
/// history order. Methods are synchronous — implementations guard their
/// state internally.
pub trait ConversationMemory: Send + Sync {
    /// Append a completed step.
    fn add_step(&self, step: Step);

    /// A stable snapshot of the full history.
    fn history(&self) -> Vec<Step>;

    /// Replace the full history (used by checkpoint restore).
    fn set_history(&self, steps: Vec<Step>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_serialization_roundtrip() {
        let mut results = HashMap::new();
        results.insert("call_1".to_string(), "4".to_string());
        let step = Step {
            speaker: Some("Agent1".into()),
            output: "computing".into(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "calc".into(),
                arguments: r#"{"expr":"2+2"}"#.into(),
            }],
            tool_results: results,
        };
        let json = serde_json::to_string(&step).unwrap();
        let back: Step = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output, "computing");
        assert_eq!(back.tool_calls.len(), 1);
        assert_eq!(back.tool_results.get("call_1").map(String::as_str), Some("4"));
    }

    #[test]
    fn text_step_has_no_tool_activity() {
        let step = Step::text("done");
        assert!(step.tool_calls.is_empty());
        assert!(step.tool_results.is_empty());
    }
}
