//! Scripted providers and stub tools shared across crate tests.
//!
//! These are real (non-cfg-gated) types so downstream crates can drive an
//! `AgentLoop` in their own tests without an HTTP backend.

use agentloom_core::error::{ProviderError, ToolError};
use agentloom_core::message::ToolCall;
use agentloom_core::provider::{Completion, Provider, ProviderRequest};
use agentloom_core::tool::{Tool, ToolResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A provider that returns a fixed sequence of scripted completions.
///
/// Every request is recorded for later inspection. Panics if more calls
/// are made than completions were provided.
pub struct SequentialMockProvider {
    completions: Mutex<Vec<Completion>>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
}

impl SequentialMockProvider {
    pub fn new(completions: Vec<Completion>) -> Self {
        Self {
            completions: Mutex::new(completions),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completions handed out so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The nth recorded request.
    pub fn request(&self, index: usize) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().get(index).cloned()
    }

    /// The most recent recorded request.
    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let completions = self.completions.lock().unwrap();
        let Some(completion) = completions.get(index) else {
            panic!(
                "SequentialMockProvider: no more completions (call #{}, have {})",
                index,
                completions.len()
            );
        };
        Ok(completion.clone())
    }
}

/// A provider that requests a tool call on every completion, never
/// terminating on its own. Arguments vary per call so the repeated-call
/// guard stays out of the way.
pub struct AlwaysToolProvider {
    tool_name: String,
    calls: AtomicUsize,
}

impl AlwaysToolProvider {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call_{n}"),
                name: self.tool_name.clone(),
                arguments: format!(r#"{{"text":"round {n}"}}"#),
            }],
            input_tokens: 10,
            output_tokens: 5,
            model: "mock-model".into(),
            continuation_id: None,
        })
    }
}

/// A text-only completion with fixed usage (10 input / 5 output tokens).
pub fn text_completion(text: &str) -> Completion {
    Completion {
        content: text.into(),
        tool_calls: vec![],
        input_tokens: 10,
        output_tokens: 5,
        model: "mock-model".into(),
        continuation_id: None,
    }
}

/// A completion that requests tool calls, with optional thought content.
pub fn tool_completion(tool_calls: Vec<ToolCall>, thought: &str) -> Completion {
    Completion {
        content: thought.into(),
        tool_calls,
        input_tokens: 10,
        output_tokens: 5,
        model: "mock-model".into(),
        continuation_id: None,
    }
}

/// Build a tool call with explicit id, name, and raw JSON arguments.
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}

/// Echoes back its `text` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echoes back the input text"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"]
        })
    }
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let text = arguments["text"].as_str().unwrap_or("").to_string();
        Ok(ToolResult::text(text))
    }
}

/// Always fails with an execution error.
pub struct FailTool;

#[async_trait]
impl Tool for FailTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "deliberate failure".into(),
        })
    }
}
