//! The team: named sub-agents spawned from a parent configuration.

use crate::delegate::DelegateTool;
use crate::roles::RoleRepository;
use agentloom_agent::loop_runner::{AgentLoop, ResiliencePolicy};
use agentloom_budget::BudgetTracker;
use agentloom_core::error::{Error, TeamError};
use agentloom_core::event::{DomainEvent, EventBus};
use agentloom_core::memory::ConversationMemory;
use agentloom_core::provider::Provider;
use agentloom_core::tool::ToolRegistry;
use agentloom_memory::InMemoryHistory;
use chrono::Utc;
use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tracing::{debug, info, warn};

/// The reserved name of the delegation tool.
pub const DELEGATE_TOOL_NAME: &str = "agent";

/// Role names suggested when a reserved name is rejected.
pub const NAME_SUGGESTIONS: &[&str] = &[
    "coder",
    "researcher",
    "analyst",
    "writer",
    "planner",
    "tester",
    "devops",
];

/// Agent names are capped at this length.
pub const MAX_NAME_LEN: usize = 50;

/// Delegated work needs more steps than a conversational turn.
const DELEGATION_MAX_ITERATIONS: i32 = 100;

/// Tool errors sub-agents tolerate before giving up.
const DELEGATION_ERROR_RETRIES: u32 = 3;

/// Sampling temperature for multi-party conversations.
const CONVERSATION_TEMPERATURE: f32 = 0.9;

const DEFAULT_MAX_TURNS: u32 = 10;
const DEFAULT_MAX_DEPTH: u32 = 2;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^[A-Za-z][A-Za-z0-9_-]*$").expect("valid agent-name pattern")
    })
}

/// Whether a proposed agent name follows the naming policy.
pub fn is_valid_agent_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN && name_pattern().is_match(name)
}

/// The parent configuration cloned into every spawned sub-agent.
#[derive(Clone)]
pub struct AgentTemplate {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub prompt: String,
    pub vars: HashMap<String, String>,
    pub tools: Arc<ToolRegistry>,
    pub budget: Option<Arc<BudgetTracker>>,
    pub events: Option<Arc<EventBus>>,
    pub streaming: bool,
}

impl AgentTemplate {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            prompt: String::new(),
            vars: HashMap::new(),
            tools,
            budget: None,
            events: None,
            streaming: false,
        }
    }

    pub fn with_budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }
}

struct TeamInner {
    names: Vec<String>,
    by_name: HashMap<String, Arc<AgentLoop>>,
    turn: u32,
    msg: String,
}

/// A set of sub-agents reachable by name for delegation or round-robin
/// conversation.
///
/// Teams are always handed out as `Arc<Team>`; the constructors tie a
/// weak self-reference into the struct so spawned delegation tools can
/// point back at the team without keeping it alive in a cycle.
pub struct Team {
    template: AgentTemplate,
    roles: Arc<dyn RoleRepository>,
    shared_memory: Arc<InMemoryHistory>,
    max_turns: AtomicU32,
    max_depth: AtomicU32,
    self_ref: Weak<Team>,
    inner: Mutex<TeamInner>,
}

impl Team {
    /// Start an empty team; agents arrive via `add_agent` or lazily
    /// through `call`.
    pub fn context(template: AgentTemplate, roles: Arc<dyn RoleRepository>) -> Arc<Self> {
        Arc::new_cyclic(|team| Self {
            template,
            roles,
            shared_memory: Arc::new(InMemoryHistory::new()),
            max_turns: AtomicU32::new(DEFAULT_MAX_TURNS),
            max_depth: AtomicU32::new(DEFAULT_MAX_DEPTH),
            self_ref: team.clone(),
            inner: Mutex::new(TeamInner {
                names: Vec::new(),
                by_name: HashMap::new(),
                turn: 0,
                msg: String::new(),
            }),
        })
    }

    /// Pre-spawn `n` generically named peers ready to converse about
    /// `topic`. Peers share one conversation memory and run at a raised
    /// sampling temperature for more varied dialogue.
    pub fn conversation(
        template: AgentTemplate,
        roles: Arc<dyn RoleRepository>,
        n: usize,
        topic: impl Into<String>,
    ) -> Result<Arc<Self>, Error> {
        if n == 0 {
            return Err(Error::Internal("team size must be > 0".into()));
        }
        let topic = topic.into();
        let topic = if topic.trim().is_empty() {
            "Hello agents, let's chat!".to_string()
        } else {
            topic
        };

        let shared_memory = Arc::new(InMemoryHistory::new());
        let memory: Arc<dyn ConversationMemory> = shared_memory.clone();
        let names: Vec<String> = (1..=n).map(|i| format!("Agent{i}")).collect();

        let mut by_name = HashMap::new();
        for name in &names {
            let peers: Vec<&str> = names
                .iter()
                .filter(|p| *p != name)
                .map(String::as_str)
                .collect();
            let agent = AgentLoop::new(
                template.provider.clone(),
                template.model.clone(),
                template.tools.clone(),
            )
            .with_name(name)
            .with_prompt(conversation_prompt(name, &peers, &topic))
            .with_temperature(CONVERSATION_TEMPERATURE)
            .with_memory(memory.clone());
            let agent = apply_template_extras(agent, &template);
            by_name.insert(name.clone(), Arc::new(agent));
        }

        info!(agents = n, "Conversation team ready");

        Ok(Arc::new_cyclic(|team| Self {
            template,
            roles,
            shared_memory,
            max_turns: AtomicU32::new(DEFAULT_MAX_TURNS),
            max_depth: AtomicU32::new(DEFAULT_MAX_DEPTH),
            self_ref: team.clone(),
            inner: Mutex::new(TeamInner {
                names,
                by_name,
                turn: 0,
                msg: topic,
            }),
        }))
    }

    /// Cap the number of conversation turns `step` will run.
    pub fn with_max_turns(self: Arc<Self>, max_turns: u32) -> Arc<Self> {
        self.max_turns.store(max_turns, Ordering::Relaxed);
        self
    }

    /// Bound delegation depth. An agent spawned at the bound receives no
    /// delegation tool at all, so recursion cannot run away.
    pub fn with_max_depth(self: Arc<Self>, max_depth: u32) -> Arc<Self> {
        self.max_depth.store(max_depth, Ordering::Relaxed);
        self
    }

    /// The delegation tool for the surrounding system to register on its
    /// root agent. Accepts `{agent, input}` and returns the delegated
    /// agent's text output.
    pub fn delegate_tool(&self) -> Arc<DelegateTool> {
        Arc::new(DelegateTool::new(self.self_ref.clone(), 0))
    }

    /// Agent names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.lock_inner().names.clone()
    }

    /// Number of agents in the team.
    pub fn len(&self) -> usize {
        self.lock_inner().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Option<Arc<AgentLoop>> {
        self.lock_inner().by_name.get(name).cloned()
    }

    /// The conversation memory shared by sibling agents.
    pub fn shared_memory(&self) -> Arc<InMemoryHistory> {
        self.shared_memory.clone()
    }

    /// Delegate `input` to the named agent, spawning it if needed.
    ///
    /// Rejects reserved and invalid names without mutating the team.
    /// Spawning is idempotent: a known name reuses the existing agent.
    /// The sub-agent's final text, or its loop error, is returned
    /// verbatim.
    pub async fn call(&self, name: &str, input: &str) -> Result<String, Error> {
        self.call_from_depth(0, name, input).await
    }

    pub(crate) async fn call_from_depth(
        &self,
        depth: u32,
        name: &str,
        input: &str,
    ) -> Result<String, Error> {
        let agent = self.resolve_agent(name, depth)?;

        debug!(agent = name, depth, input_len = input.len(), "Delegating");
        if let Some(events) = &self.template.events {
            events.publish(DomainEvent::DelegationStarted {
                from: if depth == 0 {
                    "root".into()
                } else {
                    format!("depth-{depth}")
                },
                to: name.to_string(),
                timestamp: Utc::now(),
            });
        }

        agent.run(input).await
    }

    /// Spawn (or fetch) a named, role-scoped agent without running it.
    pub fn add_agent(&self, name: &str) -> Result<Arc<AgentLoop>, Error> {
        self.resolve_agent(name, 0)
    }

    /// Remove an agent from the team.
    pub fn remove_agent(&self, name: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.by_name.remove(name).is_none() {
            return Err(TeamError::UnknownAgent(name.to_string()).into());
        }
        inner.names.retain(|n| n != name);
        Ok(())
    }

    /// Advance the round-robin conversation by one turn. Returns the
    /// speaking agent's index and its output.
    pub async fn step(&self) -> Result<(usize, String), Error> {
        let (agent, index, msg) = {
            let inner = self.lock_inner();
            if inner.turn >= self.max_turns.load(Ordering::Relaxed) {
                return Err(Error::Internal("max turns reached".into()));
            }
            if inner.names.is_empty() {
                return Err(Error::Internal("team has no agents".into()));
            }
            let index = (inner.turn as usize) % inner.names.len();
            let name = &inner.names[index];
            (inner.by_name[name].clone(), index, inner.msg.clone())
        };

        let out = agent.run(&msg).await?;

        let mut inner = self.lock_inner();
        inner.msg = out.clone();
        inner.turn += 1;
        Ok((index, out))
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, TeamInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate the name and fetch-or-spawn the agent. The lock is held
    /// only around the map access, never across an agent run.
    fn resolve_agent(&self, name: &str, depth: u32) -> Result<Arc<AgentLoop>, Error> {
        if self.template.tools.contains(name) || name == DELEGATE_TOOL_NAME {
            warn!(name, "Rejecting reserved tool name as agent name");
            return Err(TeamError::ReservedName {
                name: name.to_string(),
                suggestions: NAME_SUGGESTIONS.join(", "),
            }
            .into());
        }

        let mut inner = self.lock_inner();
        if let Some(existing) = inner.by_name.get(name) {
            debug!(name, "Reusing existing agent");
            return Ok(existing.clone());
        }

        if !is_valid_agent_name(name) {
            return Err(TeamError::InvalidName(name.to_string()).into());
        }

        let agent = Arc::new(self.spawn_role_agent(name, depth));
        inner.by_name.insert(name.to_string(), agent.clone());
        inner.names.push(name.to_string());

        if let Some(events) = &self.template.events {
            events.publish(DomainEvent::AgentSpawned {
                name: name.to_string(),
                role: name.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(agent)
    }

    /// Build a role-scoped agent from the parent template. Role lookup
    /// falls back to a generic prompt with the parent's full tool set.
    fn spawn_role_agent(&self, name: &str, depth: u32) -> AgentLoop {
        let (prompt, mut registry) = match self.roles.resolve(name) {
            Some(role) => {
                let registry = match role.allow_list() {
                    Some(allow) => self.template.tools.filtered(allow),
                    None => (*self.template.tools).clone(),
                };
                (role.render_prompt(), registry)
            }
            None => (
                format!(
                    "You are a {name} assistant. Help with tasks related to \
                     your specialization."
                ),
                (*self.template.tools).clone(),
            ),
        };

        // The parent's delegation handle never carries over; the child
        // gets its own, bound to the next depth, while the bound allows.
        registry.remove(DELEGATE_TOOL_NAME);
        let child_depth = depth + 1;
        if child_depth < self.max_depth.load(Ordering::Relaxed) {
            registry.register(Arc::new(DelegateTool::new(
                self.self_ref.clone(),
                child_depth,
            )));
        }

        info!(name, depth = child_depth, tools = registry.len(), "Spawning agent");

        let agent = AgentLoop::new(
            self.template.provider.clone(),
            self.template.model.clone(),
            Arc::new(registry),
        )
        .with_name(name)
        .with_prompt(prompt)
        .with_vars(self.template.vars.clone())
        .with_temperature(self.template.temperature)
        .with_memory(self.shared_memory.clone())
        .with_max_iterations(DELEGATION_MAX_ITERATIONS)
        .with_resilience(ResiliencePolicy::tolerant(DELEGATION_ERROR_RETRIES));
        apply_template_extras(agent, &self.template)
    }
}

fn apply_template_extras(mut agent: AgentLoop, template: &AgentTemplate) -> AgentLoop {
    if let Some(budget) = &template.budget {
        agent = agent.with_budget(budget.clone());
    }
    if let Some(events) = &template.events {
        agent = agent.with_events(events.clone());
    }
    agent.with_streaming(template.streaming)
}

fn conversation_prompt(speaker: &str, peers: &[&str], topic: &str) -> String {
    format!(
        "You are {speaker} in a conversation with fellow agents ({}) about: {topic}\n\
         - Keep replies short (2-3 sentences) and add one fresh angle.\n\
         - Do not repeat or summarise prior messages.\n\
         - Mention another agent by name only when it feels natural.\n\
         - Plain text only unless calling a tool.",
        peers.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{RoleConfig, StaticRoles};
    use agentloom_agent::test_support::{
        text_completion, tool_call, tool_completion, EchoTool, SequentialMockProvider,
    };

    fn template_with(
        provider: Arc<SequentialMockProvider>,
        extra_tools: &[Arc<dyn agentloom_core::tool::Tool>],
    ) -> AgentTemplate {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        for tool in extra_tools {
            registry.register(tool.clone());
        }
        AgentTemplate::new(provider, "mock-model", Arc::new(registry))
    }

    fn team_with(provider: Arc<SequentialMockProvider>) -> Arc<Team> {
        Team::context(template_with(provider, &[]), Arc::new(NoRoles))
    }

    use crate::roles::NoRoles;

    #[tokio::test]
    async fn spawn_is_idempotent() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            text_completion("first"),
            text_completion("second"),
        ]));
        let team = team_with(provider);

        let out1 = team.call("helper", "task one").await.unwrap();
        assert_eq!(out1, "first");
        assert_eq!(team.len(), 1);

        let out2 = team.call("helper", "task two").await.unwrap();
        assert_eq!(out2, "second");
        assert_eq!(team.len(), 1, "second call must reuse the agent");
        assert_eq!(team.names(), vec!["helper"]);
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_without_spawning() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let team = team_with(provider);
        let long_name = "a".repeat(51);

        for bad in ["", "123x", "a b", "a@b", long_name.as_str()] {
            let err = team.call(bad, "x").await.unwrap_err();
            assert!(
                matches!(err, Error::Team(TeamError::InvalidName(_))),
                "{bad:?} should be invalid, got: {err}"
            );
            assert_eq!(team.len(), 0, "{bad:?} must not spawn");
        }

        // Exactly 50 characters is still fine
        assert!(is_valid_agent_name(&"a".repeat(50)));
    }

    #[tokio::test]
    async fn reserved_tool_names_are_rejected() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let team = team_with(provider);

        // Every tool in the parent registry plus the delegate tool itself
        let mut reserved = team.template.tools.names();
        reserved.push(DELEGATE_TOOL_NAME.to_string());

        for name in reserved {
            let err = team.call(&name, "x").await.unwrap_err();
            match err {
                Error::Team(TeamError::ReservedName { suggestions, .. }) => {
                    assert!(suggestions.contains("researcher"));
                }
                other => panic!("expected ReservedName for {name}, got: {other}"),
            }
            assert_eq!(team.len(), 0);
        }
    }

    #[tokio::test]
    async fn unknown_role_falls_back_to_generic_prompt_and_full_tools() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_completion("ok")]));
        let team = team_with(provider.clone());

        team.call("helper", "do something").await.unwrap();

        let request = provider.request(0).unwrap();
        assert!(
            request.messages[0].content.contains("You are a helper assistant"),
            "got prompt: {}",
            request.messages[0].content
        );
        // Parent tools inherited unchanged (plus the delegation tool)
        let agent = team.agent("helper").unwrap();
        assert!(agent.tools().contains("echo"));
    }

    #[tokio::test]
    async fn role_allow_list_filters_tools() {
        struct NopTool(&'static str);
        #[async_trait::async_trait]
        impl agentloom_core::tool::Tool for NopTool {
            fn name(&self) -> &str {
                self.0
            }
            fn description(&self) -> &str {
                "does nothing"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object"})
            }
            async fn execute(
                &self,
                _: serde_json::Value,
            ) -> Result<agentloom_core::tool::ToolResult, agentloom_core::error::ToolError>
            {
                Ok(agentloom_core::tool::ToolResult::text(""))
            }
        }

        let provider = Arc::new(SequentialMockProvider::new(vec![text_completion("ok")]));
        let roles = StaticRoles::new().with_role(RoleConfig {
            name: "scoped".into(),
            prompt: "You are scoped.".into(),
            personality: None,
            tools: vec![],
            builtins: vec!["echo".into()],
        });
        let team = Team::context(
            template_with(provider, &[Arc::new(NopTool("danger"))]),
            Arc::new(roles),
        );

        team.call("scoped", "go").await.unwrap();

        let agent = team.agent("scoped").unwrap();
        assert!(agent.tools().contains("echo"));
        assert!(!agent.tools().contains("danger"), "allow-list must filter");
    }

    #[tokio::test]
    async fn role_personality_is_rendered_into_the_prompt() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_completion("ok")]));
        let roles = StaticRoles::new().with_role(RoleConfig {
            name: "writer".into(),
            prompt: "Voice: {{personality}}.".into(),
            personality: Some("terse".into()),
            tools: vec![],
            builtins: vec![],
        });
        let team = Team::context(template_with(provider.clone(), &[]), Arc::new(roles));

        team.call("writer", "write").await.unwrap();
        assert_eq!(provider.request(0).unwrap().messages[0].content, "Voice: terse.");
    }

    #[tokio::test]
    async fn depth_bound_controls_delegate_tool() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            text_completion("a"),
            text_completion("b"),
        ]));

        // Default bound (2): a depth-0 spawn may delegate further
        let team = team_with(provider.clone());
        team.call("outer", "x").await.unwrap();
        assert!(team.agent("outer").unwrap().tools().contains(DELEGATE_TOOL_NAME));

        // Bound of 1: the first spawn is already at the edge
        let shallow =
            Team::context(template_with(provider, &[]), Arc::new(NoRoles)).with_max_depth(1);
        shallow.call("leaf", "x").await.unwrap();
        assert!(!shallow.agent("leaf").unwrap().tools().contains(DELEGATE_TOOL_NAME));
    }

    #[tokio::test]
    async fn nested_delegation_through_the_agent_tool() {
        // worker's model delegates to "checker"; checker answers; worker
        // folds it into its final reply.
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_completion(
                vec![tool_call(
                    "c1",
                    DELEGATE_TOOL_NAME,
                    r#"{"agent":"checker","input":"verify this"}"#,
                )],
                "delegating",
            ),
            text_completion("verified: all good"),
            text_completion("done, checker says all good"),
        ]));
        let team =
            Team::context(template_with(provider, &[]), Arc::new(NoRoles)).with_max_depth(3);

        let out = team.call("worker", "check the thing").await.unwrap();
        assert_eq!(out, "done, checker says all good");
        assert_eq!(team.len(), 2);
        assert!(team.names().contains(&"checker".to_string()));
    }

    #[tokio::test]
    async fn delegation_errors_propagate_verbatim() {
        // The spawned agent's model immediately requests an unknown tool
        // with resilience on; after enough consecutive failures the loop
        // error must reach the caller unchanged.
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_completion(vec![tool_call("c1", "ghost", r#"{"i":1}"#)], ""),
            tool_completion(vec![tool_call("c2", "ghost", r#"{"i":2}"#)], ""),
            tool_completion(vec![tool_call("c3", "ghost", r#"{"i":3}"#)], ""),
            tool_completion(vec![tool_call("c4", "ghost", r#"{"i":4}"#)], ""),
        ]));
        let team = team_with(provider);

        let err = team.call("fragile", "go").await.unwrap_err();
        assert!(
            err.to_string().contains("too many consecutive errors"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn conversation_round_robin() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            text_completion("opening thought"),
            text_completion("counterpoint"),
            text_completion("synthesis"),
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let template = AgentTemplate::new(provider.clone(), "mock-model", Arc::new(registry));

        let team = Team::conversation(template, Arc::new(NoRoles), 3, "rust vs go").unwrap();
        assert_eq!(team.len(), 3);
        assert_eq!(team.names(), vec!["Agent1", "Agent2", "Agent3"]);

        let (i1, m1) = team.step().await.unwrap();
        let (i2, _m2) = team.step().await.unwrap();
        let (i3, m3) = team.step().await.unwrap();
        assert_eq!((i1, i2, i3), (0, 1, 2));
        assert_eq!(m1, "opening thought");
        assert_eq!(m3, "synthesis");

        // Peers share one memory: topic + three replies (each turn also
        // records the incoming message as a user step).
        assert!(team.shared_memory().len() >= 4);

        // Each peer's system prompt names its peers and the topic
        let first = provider.request(0).unwrap();
        assert!(first.messages[0].content.contains("Agent2"));
        assert!(first.messages[0].content.contains("rust vs go"));
    }

    #[tokio::test]
    async fn conversation_rejects_empty_team() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let template = AgentTemplate::new(provider, "mock-model", Arc::new(ToolRegistry::new()));
        assert!(Team::conversation(template, Arc::new(NoRoles), 0, "topic").is_err());
    }

    #[tokio::test]
    async fn step_stops_at_max_turns() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_completion("only")]));
        let template = AgentTemplate::new(provider, "mock-model", Arc::new(ToolRegistry::new()));
        let team = Team::conversation(template, Arc::new(NoRoles), 1, "t")
            .unwrap()
            .with_max_turns(1);

        team.step().await.unwrap();
        let err = team.step().await.unwrap_err();
        assert!(err.to_string().contains("max turns reached"));
    }

    #[tokio::test]
    async fn remove_agent_unknown_name() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_completion("hi")]));
        let team = team_with(provider);

        let err = team.remove_agent("nobody").unwrap_err();
        assert!(matches!(err, Error::Team(TeamError::UnknownAgent(_))));

        team.call("somebody", "x").await.unwrap();
        team.remove_agent("somebody").unwrap();
        assert_eq!(team.len(), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_are_safe() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            text_completion("one"),
            text_completion("two"),
        ]));
        let team = team_with(provider);

        let t1 = {
            let team = team.clone();
            tokio::spawn(async move { team.call("alpha", "a").await })
        };
        let t2 = {
            let team = team.clone();
            tokio::spawn(async move { team.call("beta", "b").await })
        };

        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();
        assert_eq!(team.len(), 2);
    }
}
