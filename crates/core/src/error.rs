//! Error types for the agentloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all agentloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory / checkpoint errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Agent loop errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Team / delegation errors ---
    #[error("Team error: {0}")]
    Team(#[from] TeamError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors surfaced by the agent loop itself.
///
/// Fatal loop errors are wrapped in `Turn` so callers always see which
/// agent failed and on which iteration.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("exceeded maximum iterations ({0})")]
    IterationLimit(u32),

    #[error("too many consecutive errors ({0}), stopping execution")]
    TooManyConsecutiveErrors(u32),

    #[error("agent '{agent}' failed on iteration {iteration}: {source}")]
    Turn {
        agent: String,
        iteration: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("{} of {} parallel agents failed: {}", .failures.len(), .total, join_failures(.failures))]
    Parallel { total: usize, failures: Vec<Error> },
}

fn join_failures(failures: &[Error]) -> String {
    failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum TeamError {
    #[error(
        "cannot create agent with tool name '{name}': tool names are reserved. \
         Use proper agent names like: {suggestions}"
    )]
    ReservedName { name: String, suggestions: String },

    #[error(
        "invalid agent name '{0}': agent names must start with a letter, be at most \
         50 characters, and contain only letters, numbers, underscores, and hyphens"
    )]
    InvalidName(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_displays_name_and_reason() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "fetch".into(),
            reason: "connection refused".into(),
        });
        assert!(err.to_string().contains("fetch"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn turn_error_carries_agent_and_iteration() {
        let err = AgentError::Turn {
            agent: "coder".into(),
            iteration: 4,
            source: Box::new(Error::Tool(ToolError::NotFound("rm".into()))),
        };
        let text = err.to_string();
        assert!(text.contains("coder"));
        assert!(text.contains("iteration 4"));
    }

    #[test]
    fn parallel_error_lists_every_failure() {
        let err = AgentError::Parallel {
            total: 3,
            failures: vec![
                Error::Internal("boom".into()),
                Error::Internal("bang".into()),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 of 3"));
        assert!(text.contains("boom"));
        assert!(text.contains("bang"));
    }

    #[test]
    fn reserved_name_error_suggests_alternatives() {
        let err = TeamError::ReservedName {
            name: "fetch".into(),
            suggestions: "coder, researcher".into(),
        };
        assert!(err.to_string().contains("'fetch'"));
        assert!(err.to_string().contains("researcher"));
    }
}
