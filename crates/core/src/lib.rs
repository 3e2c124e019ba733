//! # agentloom Core
//!
//! Domain types, traits, and error definitions for the agentloom
//! multi-agent runtime. This crate has **zero framework dependencies** —
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ProviderError, Result, TeamError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use memory::{ConversationMemory, Step};
pub use message::{ChatMessage, Role, ToolCall};
pub use provider::{
    collect_stream, Completion, Provider, ProviderRequest, StreamChunk, StreamSummary,
    ToolDefinition,
};
pub use store::KeyValueStore;
pub use tool::{Tool, ToolRegistry, ToolResult};
