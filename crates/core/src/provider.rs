//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to a model and get a
//! response back, either as a complete message or as a stream of chunks.
//! The agent loop treats both shapes identically: `collect_stream`
//! collapses a stream into the same `Completion` a direct call returns.

use crate::error::ProviderError;
use crate::message::{ChatMessage, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o", "anthropic/claude-sonnet-4")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<ChatMessage>,

    /// Temperature (0.0 = deterministic, higher = more varied)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete model response — the shape the agent loop consumes,
/// whether it came from a direct call or a collected stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Tool calls the model requested, in the order received
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Input token count (0 if the provider did not report it)
    #[serde(default)]
    pub input_tokens: u32,

    /// Output token count (0 if the provider did not report it)
    #[serde(default)]
    pub output_tokens: u32,

    /// Which model actually responded (may differ from requested)
    #[serde(default)]
    pub model: String,

    /// Opaque continuation id, when the stream exposed one. Lets a
    /// follow-up request reference this response without resending
    /// full history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_id: Option<String>,
}

/// The terminal summary of a stream: everything assembled once the
/// source signalled completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    /// Merged tool calls: legacy-indexed entries first (ascending index),
    /// then structured-event entries in discovery order.
    pub tool_calls: Vec<ToolCall>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
    pub continuation_id: Option<String>,
}

/// One incremental unit of a streaming response.
///
/// Exactly one `Done` (or one transport error) is emitted per stream;
/// after it the producer closes the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A content delta
    Content(String),
    /// The terminal chunk
    Done(StreamSummary),
}

/// The core Provider trait.
///
/// Every model backend implements this. The agent loop calls `complete()`
/// or `stream()` without knowing which provider is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Send a request and block until the complete response arrives.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<Completion, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// The default implementation calls `complete()` and wraps the result
    /// as a single terminal chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let completion = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx
            .send(Ok(StreamChunk::Content(completion.content.clone())))
            .await;
        let _ = tx
            .send(Ok(StreamChunk::Done(StreamSummary {
                tool_calls: completion.tool_calls,
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                model: completion.model,
                continuation_id: completion.continuation_id,
            })))
            .await;
        Ok(rx)
    }

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Drain a stream receiver into a single `Completion`.
///
/// Content deltas are concatenated in arrival order; the terminal chunk
/// supplies tool calls, usage, and the continuation id. The first error
/// aborts. A channel closed before any terminal chunk means the producer
/// died mid-stream and is surfaced as `StreamInterrupted`.
pub async fn collect_stream(
    mut rx: tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
) -> std::result::Result<Completion, ProviderError> {
    let mut content = String::new();
    let mut summary: Option<StreamSummary> = None;

    while let Some(item) = rx.recv().await {
        match item? {
            StreamChunk::Content(delta) => content.push_str(&delta),
            StreamChunk::Done(s) => summary = Some(s),
        }
    }

    let summary = summary.ok_or_else(|| {
        ProviderError::StreamInterrupted("stream closed before completion".into())
    })?;

    Ok(Completion {
        content,
        tool_calls: summary.tool_calls,
        input_tokens: summary.input_tokens,
        output_tokens: summary.output_tokens,
        model: summary.model,
        continuation_id: summary.continuation_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<Completion, ProviderError> {
            Ok(Completion {
                content: "hello".into(),
                model: "fixed-1".into(),
                input_tokens: 3,
                output_tokens: 1,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn default_stream_collapses_to_completion() {
        let provider = FixedProvider;
        let rx = provider
            .stream(ProviderRequest {
                model: "fixed-1".into(),
                messages: vec![ChatMessage::user("hi")],
                temperature: 0.7,
                max_tokens: None,
                tools: vec![],
                stop: vec![],
            })
            .await
            .unwrap();

        let completion = collect_stream(rx).await.unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(completion.input_tokens, 3);
        assert_eq!(completion.model, "fixed-1");
    }

    #[tokio::test]
    async fn collect_concatenates_deltas_in_order() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(Ok(StreamChunk::Content("Hel".into()))).await.unwrap();
        tx.send(Ok(StreamChunk::Content("lo ".into()))).await.unwrap();
        tx.send(Ok(StreamChunk::Content("world".into()))).await.unwrap();
        tx.send(Ok(StreamChunk::Done(StreamSummary {
            model: "m".into(),
            ..Default::default()
        })))
        .await
        .unwrap();
        drop(tx);

        let completion = collect_stream(rx).await.unwrap();
        assert_eq!(completion.content, "Hello world");
    }

    #[tokio::test]
    async fn collect_surfaces_stream_error() {
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        tx.send(Err(ProviderError::Network("reset".into())))
            .await
            .unwrap();
        drop(tx);

        let err = collect_stream(rx).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }

    #[tokio::test]
    async fn collect_rejects_truncated_stream() {
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        tx.send(Ok(StreamChunk::Content("partial".into())))
            .await
            .unwrap();
        drop(tx); // producer vanished without a terminal chunk

        let err = collect_stream(rx).await.unwrap_err();
        assert!(matches!(err, ProviderError::StreamInterrupted(_)));
    }
}
