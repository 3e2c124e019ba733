//! The agent reasoning loop implementation.

use agentloom_budget::BudgetTracker;
use agentloom_core::error::{AgentError, Error, ToolError};
use agentloom_core::event::{DomainEvent, EventBus};
use agentloom_core::memory::{ConversationMemory, Step};
use agentloom_core::message::{ChatMessage, ToolCall};
use agentloom_core::provider::{collect_stream, Completion, Provider, ProviderRequest};
use agentloom_core::store::KeyValueStore;
use agentloom_core::tool::ToolRegistry;
use agentloom_memory::InMemoryHistory;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Iteration cap applied when the configured cap is 0.
pub const DEFAULT_MAX_ITERATIONS: u32 = 8;

/// Checkpoint bucket in the key/value store.
const STATE_BUCKET: &str = "agent-state";

/// Sliding window size for the repeated-call guard.
const MAX_RECENT_CALLS: usize = 6;
/// Identical (name, arguments) calls tolerated inside the window.
const MAX_IDENTICAL_CALLS: usize = 3;

/// How tool failures are handled by the loop.
#[derive(Debug, Clone)]
pub struct ResiliencePolicy {
    /// Record tool errors as in-band results the model can see, instead
    /// of failing the turn.
    pub treat_errors_as_results: bool,

    /// Consecutive tool errors tolerated before the turn fails anyway.
    pub max_error_retries: u32,

    /// Append context and a suggestion to in-band error results.
    pub include_error_context: bool,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            treat_errors_as_results: false,
            max_error_retries: 3,
            include_error_context: false,
        }
    }
}

impl ResiliencePolicy {
    /// The policy delegated sub-agents run with: errors become results
    /// and the model gets context to recover from them.
    pub fn tolerant(max_error_retries: u32) -> Self {
        Self {
            treat_errors_as_results: true,
            max_error_retries,
            include_error_context: true,
        }
    }
}

/// One agent: a conversation, a tool set, and the loop that drives them.
pub struct AgentLoop {
    id: Uuid,
    name: Option<String>,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    prompt: String,
    vars: HashMap<String, String>,
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn ConversationMemory>,
    store: Option<Arc<dyn KeyValueStore>>,
    max_iterations: i32,
    resilience: ResiliencePolicy,
    budget: Option<Arc<BudgetTracker>>,
    events: Option<Arc<EventBus>>,
    streaming: bool,
    last_continuation: Mutex<Option<String>>,
}

impl AgentLoop {
    /// Create a new agent loop with an empty in-memory conversation.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            prompt: default_prompt(),
            vars: HashMap::new(),
            tools,
            memory: Arc::new(InMemoryHistory::new()),
            store: None,
            max_iterations: 0,
            resilience: ResiliencePolicy::default(),
            budget: None,
            events: None,
            streaming: false,
            last_continuation: Mutex::new(None),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Attach a conversation memory (siblings in a team share one).
    pub fn with_memory(mut self, memory: Arc<dyn ConversationMemory>) -> Self {
        self.memory = memory;
        self
    }

    /// Attach a checkpoint store.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the iteration cap: 0 = default (8), negative = unbounded.
    pub fn with_max_iterations(mut self, max: i32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_resilience(mut self, policy: ResiliencePolicy) -> Self {
        self.resilience = policy;
        self
    }

    /// Attach a budget tracker (may be shared with sibling agents).
    pub fn with_budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Use the provider's streaming endpoint, collapsed per call.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name used in logs, events, and error wrapping.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn memory(&self) -> &Arc<dyn ConversationMemory> {
        &self.memory
    }

    /// The continuation id from the most recent completion, if the
    /// provider exposed one.
    pub fn last_continuation_id(&self) -> Option<String> {
        self.last_continuation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Process one user input through the loop and return the final text.
    pub async fn run(&self, input: &str) -> Result<String, Error> {
        let agent_label = self.display_name();
        info!(agent = %agent_label, input_len = input.len(), "Starting turn");

        if !input.trim().is_empty() {
            self.memory.add_step(Step {
                speaker: Some("user".into()),
                output: input.to_string(),
                ..Default::default()
            });
        }

        let mut msgs = self.build_messages();
        let definitions = self.tools.definitions();
        let limit = self.iteration_limit();

        let mut consecutive_errors: u32 = 0;
        let mut recent_calls: Vec<(String, String)> = Vec::new();
        let mut iteration: u32 = 0;

        loop {
            if let Some(limit) = limit {
                if iteration >= limit {
                    warn!(agent = %agent_label, limit, "Iteration cap reached");
                    return Err(AgentError::IterationLimit(limit).into());
                }
            }
            debug!(agent = %agent_label, iteration, "Loop iteration");

            let completion = self
                .call_model(&msgs, &definitions)
                .await
                .map_err(|e| self.wrap_turn(iteration, e.into()))?;

            self.record_usage(&completion, msgs.as_slice());
            if let Some(id) = &completion.continuation_id {
                *self
                    .last_continuation
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = Some(id.clone());
            }

            if completion.tool_calls.is_empty() {
                self.memory.add_step(Step {
                    speaker: Some(agent_label.clone()),
                    output: completion.content.clone(),
                    ..Default::default()
                });
                self.publish(DomainEvent::TurnCompleted {
                    agent: agent_label.clone(),
                    iterations: iteration + 1,
                    timestamp: Utc::now(),
                });
                return Ok(completion.content);
            }

            debug!(
                agent = %agent_label,
                tool_count = completion.tool_calls.len(),
                "Executing tool calls"
            );

            msgs.push(ChatMessage::assistant(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));
            let mut step = Step {
                speaker: Some(agent_label.clone()),
                output: completion.content.clone(),
                tool_calls: completion.tool_calls.clone(),
                tool_results: HashMap::new(),
            };

            if let Some(stuck_on) =
                track_repeated_calls(&mut recent_calls, &completion.tool_calls)
            {
                warn!(agent = %agent_label, tool = %stuck_on, "Repeated tool call detected");
                self.memory.add_step(step);
                return Ok(format!(
                    "Task stopped: detected repeated execution of tool '{stuck_on}' \
                     with identical arguments."
                ));
            }

            for call in &completion.tool_calls {
                match self.execute_tool(&agent_label, call).await {
                    Ok(output) => {
                        consecutive_errors = 0;
                        step.tool_results.insert(call.id.clone(), output.clone());
                        msgs.push(ChatMessage::tool_result(&call.id, &output));
                    }
                    Err(err) => {
                        if !self.resilience.treat_errors_as_results {
                            return Err(self.wrap_turn(iteration, err));
                        }
                        let error_text = self.format_tool_error(&call.name, &err);
                        consecutive_errors += 1;
                        step.tool_results
                            .insert(call.id.clone(), error_text.clone());
                        msgs.push(ChatMessage::tool_result(&call.id, &error_text));

                        if consecutive_errors > self.resilience.max_error_retries {
                            self.memory.add_step(step);
                            return Err(
                                AgentError::TooManyConsecutiveErrors(consecutive_errors).into()
                            );
                        }
                    }
                }
            }

            self.memory.add_step(step);
            iteration += 1;
        }
    }

    // ── Checkpointing ─────────────────────────────────────────────────

    /// Persist the full conversation history under the given id
    /// (the agent's own id when empty).
    pub async fn save_state(&self, id: &str) -> Result<(), Error> {
        let store = self.checkpoint_store()?;
        let key = self.state_key(id);
        let blob = serde_json::to_vec(&self.memory.history())?;
        store.set(STATE_BUCKET, &key, blob).await?;
        debug!(agent = %self.display_name(), key = %key, "State saved");
        Ok(())
    }

    /// Restore the conversation history saved under the given id.
    /// A missing checkpoint is not an error.
    pub async fn load_state(&self, id: &str) -> Result<(), Error> {
        let store = self.checkpoint_store()?;
        let key = self.state_key(id);
        if let Some(blob) = store.get(STATE_BUCKET, &key).await? {
            let steps: Vec<Step> = serde_json::from_slice(&blob)?;
            self.memory.set_history(steps);
            debug!(agent = %self.display_name(), key = %key, "State restored");
        }
        Ok(())
    }

    /// Persist the loop state under this agent's own id.
    pub async fn checkpoint(&self) -> Result<(), Error> {
        self.save_state("").await
    }

    /// Restore the loop state saved under this agent's own id.
    pub async fn resume(&self) -> Result<(), Error> {
        self.load_state("").await
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn checkpoint_store(&self) -> Result<&Arc<dyn KeyValueStore>, Error> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::Internal("no checkpoint store configured".into()))
    }

    fn state_key(&self, id: &str) -> String {
        if id.is_empty() {
            self.id.to_string()
        } else {
            id.to_string()
        }
    }

    fn iteration_limit(&self) -> Option<u32> {
        match self.max_iterations {
            0 => Some(DEFAULT_MAX_ITERATIONS),
            n if n < 0 => None,
            n => Some(n as u32),
        }
    }

    /// System prompt + replayed history. Tool results replay in the order
    /// of each step's tool-call list.
    fn build_messages(&self) -> Vec<ChatMessage> {
        let prompt = apply_vars(&self.prompt, &self.vars);
        let mut msgs = vec![ChatMessage::system(prompt)];

        for step in self.memory.history() {
            if step.speaker.as_deref() == Some("user") {
                msgs.push(ChatMessage::user(&step.output));
                continue;
            }
            msgs.push(ChatMessage::assistant(
                &step.output,
                step.tool_calls.clone(),
            ));
            for call in &step.tool_calls {
                if let Some(result) = step.tool_results.get(&call.id) {
                    msgs.push(ChatMessage::tool_result(&call.id, result));
                }
            }
        }
        msgs
    }

    async fn call_model(
        &self,
        msgs: &[ChatMessage],
        definitions: &[agentloom_core::provider::ToolDefinition],
    ) -> Result<Completion, agentloom_core::error::ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: msgs.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: definitions.to_vec(),
            stop: vec![],
        };

        if self.streaming {
            let rx = self.provider.stream(request).await?;
            collect_stream(rx).await
        } else {
            self.provider.complete(request).await
        }
    }

    fn record_usage(&self, completion: &Completion, msgs: &[ChatMessage]) {
        let input_tokens = if completion.input_tokens > 0 {
            completion.input_tokens as u64
        } else {
            estimate_message_tokens(msgs)
        };
        let output_tokens = if completion.output_tokens > 0 {
            completion.output_tokens as u64
        } else {
            estimate_tokens(&completion.content)
        };

        if let Some(budget) = &self.budget {
            let model = if completion.model.trim().is_empty() {
                &self.model
            } else {
                &completion.model
            };
            if budget.add_model_usage(model, input_tokens, output_tokens) {
                warn!(agent = %self.display_name(), "Agent is over budget");
            }
        }

        self.publish(DomainEvent::ModelCallCompleted {
            agent: self.display_name(),
            model: completion.model.clone(),
            input_tokens: input_tokens as u32,
            output_tokens: output_tokens as u32,
            timestamp: Utc::now(),
        });
    }

    async fn execute_tool(&self, agent: &str, call: &ToolCall) -> Result<String, Error> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Err(ToolError::NotFound(call.name.clone()).into());
        };

        let mut args: serde_json::Value = if call.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.arguments)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?
        };
        apply_vars_value(&mut args, &self.vars);

        let start = std::time::Instant::now();
        let result = tool.execute(args).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.publish(DomainEvent::ToolExecuted {
            agent: agent.to_string(),
            tool_name: call.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(result) => Ok(normalize_result(result.output)),
            Err(e) => {
                warn!(agent, tool = %call.name, error = %e, "Tool execution failed");
                Err(e.into())
            }
        }
    }

    /// The in-band text the model sees when a tool fails under the
    /// resilience policy.
    fn format_tool_error(&self, tool_name: &str, err: &Error) -> String {
        let base = match err {
            Error::Tool(ToolError::NotFound(name)) => format!(
                "Error: unknown tool '{}'. Available tools: {}",
                name,
                self.tools.names().join(", ")
            ),
            other => format!("Error executing tool '{tool_name}': {other}"),
        };
        if !self.resilience.include_error_context {
            return base;
        }
        format!(
            "{base}\n\nContext:\n- Tool: {tool_name}\n- Suggestion: try a different \
             approach or check the tool usage."
        )
    }

    fn wrap_turn(&self, iteration: u32, source: Error) -> Error {
        AgentError::Turn {
            agent: self.display_name(),
            iteration,
            source: Box::new(source),
        }
        .into()
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

fn default_prompt() -> String {
    "You are a helpful assistant. Use the available tools when they help \
     accomplish the task. Be concise and accurate."
        .into()
}

/// Replace `{{key}}` placeholders with their bound values.
fn apply_vars(text: &str, vars: &HashMap<String, String>) -> String {
    let mut out = text.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// Recursively substitute variables into every string of a JSON value.
fn apply_vars_value(value: &mut serde_json::Value, vars: &HashMap<String, String>) {
    if vars.is_empty() {
        return;
    }
    match value {
        serde_json::Value::String(s) => *s = apply_vars(s, vars),
        serde_json::Value::Array(items) => {
            for item in items {
                apply_vars_value(item, vars);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                apply_vars_value(v, vars);
            }
        }
        _ => {}
    }
}

/// Blank tool output is replaced so the model always sees a result.
fn normalize_result(output: String) -> String {
    if output.trim().is_empty() {
        "Operation completed successfully.".into()
    } else {
        output
    }
}

/// Rough token estimate (4 chars ≈ 1 token) for providers that don't
/// report usage.
fn estimate_tokens(text: &str) -> u64 {
    (text.len() / 4) as u64
}

fn estimate_message_tokens(msgs: &[ChatMessage]) -> u64 {
    msgs.iter()
        .map(|m| {
            estimate_tokens(&m.content)
                + m.tool_calls
                    .iter()
                    .map(|tc| estimate_tokens(&tc.name) + estimate_tokens(&tc.arguments))
                    .sum::<u64>()
        })
        .sum()
}

/// Track (name, arguments) signatures in a sliding window; returns the
/// offending tool name once the same call repeats too often.
fn track_repeated_calls(
    recent: &mut Vec<(String, String)>,
    calls: &[ToolCall],
) -> Option<String> {
    for call in calls {
        let signature = (call.name.clone(), call.arguments.clone());
        recent.push(signature.clone());
        if recent.len() > MAX_RECENT_CALLS {
            recent.remove(0);
        }
        let identical = recent.iter().filter(|s| **s == signature).count();
        if identical >= MAX_IDENTICAL_CALLS {
            return Some(call.name.clone());
        }
    }
    None
}
