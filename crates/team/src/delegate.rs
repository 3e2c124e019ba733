//! The `agent` tool — the delegation surface.
//!
//! Each instance holds an explicit handle to its team and the depth it
//! operates at; there is no ambient lookup. The handle is weak so the
//! team's agents (whose registries contain this tool) never keep the
//! team alive in a cycle.

use crate::team::{Team, DELEGATE_TOOL_NAME};
use agentloom_core::error::ToolError;
use agentloom_core::tool::{Tool, ToolResult};
use async_trait::async_trait;
use std::sync::Weak;

/// Delegates `{agent, input}` to a named sub-agent of the bound team.
pub struct DelegateTool {
    team: Weak<Team>,
    depth: u32,
}

impl DelegateTool {
    pub(crate) fn new(team: Weak<Team>, depth: u32) -> Self {
        Self { team, depth }
    }

    /// The delegation depth this handle operates at.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        DELEGATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Delegate a task to another agent by name"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "description": "Name of the agent to delegate to"
                },
                "input": {
                    "type": "string",
                    "description": "Task description or input for the agent"
                }
            },
            "required": ["agent", "input"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let team = self.team.upgrade().ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: DELEGATE_TOOL_NAME.into(),
            reason: "the team this tool belonged to no longer exists".into(),
        })?;

        let agent = arguments["agent"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("missing 'agent' field".into()))?;
        let input = arguments["input"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'input' field".into()))?;

        let output = team
            .call_from_depth(self.depth, agent, input)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: DELEGATE_TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::text(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::NoRoles;
    use crate::team::AgentTemplate;
    use agentloom_agent::test_support::{text_completion, SequentialMockProvider};
    use agentloom_core::tool::ToolRegistry;
    use std::sync::Arc;

    fn make_team(provider: Arc<SequentialMockProvider>) -> Arc<Team> {
        Team::context(
            AgentTemplate::new(provider, "mock-model", Arc::new(ToolRegistry::new())),
            Arc::new(NoRoles),
        )
    }

    #[tokio::test]
    async fn delegates_and_returns_output() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_completion(
            "delegated result",
        )]));
        let team = make_team(provider);
        let tool = team.delegate_tool();

        let result = tool
            .execute(serde_json::json!({"agent": "worker", "input": "do it"}))
            .await
            .unwrap();
        assert_eq!(result.output, "delegated result");
        assert_eq!(team.len(), 1);
    }

    #[tokio::test]
    async fn missing_fields_are_invalid_arguments() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let team = make_team(provider);
        let tool = team.delegate_tool();

        let err = tool
            .execute(serde_json::json!({"input": "no agent"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = tool
            .execute(serde_json::json!({"agent": "worker"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn dropped_team_fails_cleanly() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let team = make_team(provider);
        let tool = team.delegate_tool();
        drop(team);

        let err = tool
            .execute(serde_json::json!({"agent": "worker", "input": "x"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { reason, .. } => {
                assert!(reason.contains("no longer exists"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn delegation_failures_surface_as_execution_errors() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let team = make_team(provider);
        let tool = team.delegate_tool();

        // Reserved name bubbles up through the tool error
        let err = tool
            .execute(serde_json::json!({"agent": "agent", "input": "x"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { reason, .. } => {
                assert!(reason.contains("reserved"), "got: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
