//! Incremental stream assembly.
//!
//! The provider emits tool calls in one of two shapes, sometimes both in
//! a single stream:
//!
//! 1. **Legacy deltas** — `*.delta` events whose type mentions
//!    `tool_calls`, carrying array entries with a positional `index`, an
//!    optional id/name, and argument fragments (flattened or nested under
//!    `function`). Fragments for one index concatenate in arrival order.
//! 2. **Structured events** — `response.output_item.added` announces a
//!    function call (item id, call id, name); `function_call_arguments.delta`
//!    appends argument text; `function_call_arguments.done` may carry the
//!    full argument text, which overwrites the accumulation.
//!
//! Both schemes are kept as ordered lists so the merged result is
//! deterministic: legacy entries first in ascending index order, then
//! structured entries in discovery order.

use agentloom_core::message::ToolCall;
use agentloom_core::provider::StreamSummary;
use tracing::trace;

/// A partially assembled legacy-form tool call.
#[derive(Debug, Default)]
struct LegacyPartial {
    index: u64,
    id: String,
    name: String,
    arguments: String,
}

/// A partially assembled structured-event tool call, keyed by item id.
#[derive(Debug, Default)]
struct StructuredPartial {
    item_id: String,
    call_id: String,
    name: String,
    arguments: String,
}

/// What a fed event produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    /// Event consumed (or unrecognized and ignored); nothing to emit.
    Ignored,
    /// A content delta to forward downstream.
    Content(String),
    /// The stream signalled completion; call `finish()`.
    Terminal,
}

/// Assembles one model response out of its incremental event payloads.
///
/// Feed it the JSON payload of each `data:` record (the caller handles
/// the literal `[DONE]` marker) and call `finish()` once the stream ends
/// for the merged terminal summary.
#[derive(Debug)]
pub struct StreamAssembler {
    legacy: Vec<LegacyPartial>,
    structured: Vec<StructuredPartial>,
    input_tokens: u32,
    output_tokens: u32,
    model: String,
    continuation_id: Option<String>,
}

impl StreamAssembler {
    /// Create an assembler for a response from the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            legacy: Vec::new(),
            structured: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            model: model.into(),
            continuation_id: None,
        }
    }

    /// Consume one event payload. Malformed JSON and unknown event types
    /// are ignored, not errors.
    pub fn feed(&mut self, payload: &str) -> FeedOutcome {
        let env: serde_json::Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, "Ignoring unparseable stream payload");
                return FeedOutcome::Ignored;
            }
        };

        // Continuation id can surface either flattened or on the response object.
        if let Some(id) = env["response_id"].as_str().filter(|s| !s.is_empty()) {
            self.continuation_id = Some(id.to_string());
        }
        if let Some(id) = env["response"]["id"].as_str().filter(|s| !s.is_empty()) {
            self.continuation_id = Some(id.to_string());
        }

        let event_type = env["type"].as_str().unwrap_or_default();

        if event_type.ends_with(".delta") && event_type.contains("output_text") {
            if let Some(delta) = env["delta"].as_str().filter(|d| !d.is_empty()) {
                return FeedOutcome::Content(delta.to_string());
            }
            return FeedOutcome::Ignored;
        }

        if event_type.ends_with(".delta") && event_type.contains("tool_calls") {
            if let Some(entries) = env["tool_calls"].as_array() {
                for entry in entries {
                    self.apply_legacy_delta(entry);
                }
            }
            return FeedOutcome::Ignored;
        }

        match event_type {
            "response.output_item.added" => {
                self.apply_item_added(&env["item"]);
                FeedOutcome::Ignored
            }
            "response.function_call_arguments.delta" => {
                self.apply_arguments_delta(&env);
                FeedOutcome::Ignored
            }
            "response.function_call_arguments.done" => {
                self.apply_arguments_done(&env);
                FeedOutcome::Ignored
            }
            "response.completed" => {
                if let Some(usage) = env["usage"].as_object() {
                    self.input_tokens = usage
                        .get("input_tokens")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u32;
                    self.output_tokens = usage
                        .get("output_tokens")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u32;
                }
                FeedOutcome::Terminal
            }
            _ => FeedOutcome::Ignored,
        }
    }

    fn apply_legacy_delta(&mut self, entry: &serde_json::Value) {
        let index = entry["index"].as_u64().unwrap_or(0);
        let pos = match self.legacy.iter().position(|p| p.index == index) {
            Some(pos) => pos,
            None => {
                self.legacy.push(LegacyPartial {
                    index,
                    ..Default::default()
                });
                self.legacy.len() - 1
            }
        };
        let partial = &mut self.legacy[pos];

        if let Some(id) = entry["id"].as_str().filter(|s| !s.is_empty()) {
            partial.id = id.to_string();
        }
        // Flattened fields
        if let Some(name) = entry["name"].as_str().filter(|s| !s.is_empty()) {
            partial.name = name.to_string();
        }
        if let Some(args) = entry["arguments"].as_str() {
            if !args.trim().is_empty() {
                partial.arguments.push_str(args);
            }
        }
        // Nested legacy fallback
        if let Some(func) = entry["function"].as_object() {
            if let Some(name) = func.get("name").and_then(|v| v.as_str()) {
                if !name.is_empty() {
                    partial.name = name.to_string();
                }
            }
            if let Some(args) = func.get("arguments").and_then(|v| v.as_str()) {
                if !args.trim().is_empty() {
                    partial.arguments.push_str(args);
                }
            }
        }
    }

    fn apply_item_added(&mut self, item: &serde_json::Value) {
        if item["type"].as_str() != Some("function_call") {
            return;
        }
        let (Some(item_id), Some(name)) = (
            item["id"].as_str().filter(|s| !s.is_empty()),
            item["name"].as_str().filter(|s| !s.is_empty()),
        ) else {
            return;
        };
        let call_id = item["call_id"].as_str().unwrap_or_default();

        if let Some(existing) = self.structured.iter_mut().find(|p| p.item_id == item_id) {
            existing.call_id = call_id.to_string();
            existing.name = name.to_string();
            return;
        }
        trace!(item_id, name, "Stream announced function call");
        self.structured.push(StructuredPartial {
            item_id: item_id.to_string(),
            call_id: call_id.to_string(),
            name: name.to_string(),
            arguments: String::new(),
        });
    }

    fn apply_arguments_delta(&mut self, env: &serde_json::Value) {
        let Some(item_id) = env["item_id"].as_str() else {
            return;
        };
        let Some(partial) = self.structured.iter_mut().find(|p| p.item_id == item_id) else {
            return;
        };
        if let Some(delta) = env["delta"].as_str() {
            // Whitespace-only fragments add nothing to the assembly
            if !delta.trim().is_empty() {
                partial.arguments.push_str(delta);
            }
        }
    }

    fn apply_arguments_done(&mut self, env: &serde_json::Value) {
        let Some(item_id) = env["item_id"].as_str() else {
            return;
        };
        let Some(partial) = self.structured.iter_mut().find(|p| p.item_id == item_id) else {
            return;
        };
        // The terminal event's full text wins over the accumulation
        if let Some(args) = env["arguments"].as_str().filter(|s| !s.is_empty()) {
            partial.arguments = args.to_string();
        }
    }

    /// Merge both accounting schemes into the terminal summary: legacy
    /// entries first in ascending index order, then structured entries in
    /// discovery order.
    pub fn finish(&mut self) -> StreamSummary {
        let mut legacy = std::mem::take(&mut self.legacy);
        legacy.sort_by_key(|p| p.index);

        let mut tool_calls: Vec<ToolCall> = legacy
            .into_iter()
            .map(|p| ToolCall {
                id: p.id,
                name: p.name,
                arguments: p.arguments,
            })
            .collect();
        tool_calls.extend(std::mem::take(&mut self.structured).into_iter().map(|p| {
            ToolCall {
                id: p.call_id,
                name: p.name,
                arguments: p.arguments,
            }
        }));

        StreamSummary {
            tool_calls,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            model: std::mem::take(&mut self.model),
            continuation_id: self.continuation_id.take(),
        }
    }
}
