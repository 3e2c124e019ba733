//! Model provider implementations for agentloom.
//!
//! `OpenAiCompatProvider` speaks the OpenAI-compatible HTTP surface
//! (direct completions and streaming SSE); `StreamAssembler` turns the
//! incremental event stream back into assembled tool calls and usage;
//! `ProviderRouter` maps names to configured providers.

pub mod decoder;
pub mod openai_compat;
pub mod router;

pub use decoder::{FeedOutcome, StreamAssembler};
pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
