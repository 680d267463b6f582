//! The core [`Provider`] trait for LLM chat completions.
//!
//! All LLM providers implement this trait. `complete` executes a request
//! to completion; `complete_stream` yields deltas as they arrive, with
//! reasoning and content on separate channels. Adapters whose backend has
//! no native streaming get a conforming default: the full reasoning as a
//! synthetic initial block, then the payload, then `Done`.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse, StreamChunk};

/// A pinned, boxed stream of chunks.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// A provider that can execute chat completion requests.
///
/// # Example
///
/// ```rust,ignore
/// use genesis_llm::{ChatMessage, ChatRequest, Provider};
///
/// async fn ask(provider: &dyn Provider) -> genesis_llm::Result<String> {
///     let request = ChatRequest::new(vec![ChatMessage::user("What is 2+2?")]);
///     let response = provider.complete(&request).await?;
///     Ok(response.content)
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider name (e.g. "openai", "anthropic", "scripted").
    fn name(&self) -> &str;

    /// Execute a chat completion request and return the full response.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Execute a chat completion request, streaming deltas.
    ///
    /// The default implementation calls [`complete`](Self::complete) and
    /// synthesizes a stream: one `ReasoningDelta` with the whole
    /// reasoning block (if any), one `TextDelta` with the content, one
    /// `ToolCall` per requested invocation, then `Done`.
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let response = self.complete(request).await?;
        let mut chunks = Vec::new();
        if let Some(reasoning) = response.reasoning {
            if !reasoning.is_empty() {
                chunks.push(Ok(StreamChunk::ReasoningDelta(reasoning)));
            }
        }
        chunks.push(Ok(StreamChunk::TextDelta(response.content)));
        for call in response.tool_calls {
            chunks.push(Ok(StreamChunk::ToolCall(call)));
        }
        chunks.push(Ok(StreamChunk::Done {
            finish_reason: Some("stop".into()),
            usage: response.usage,
        }));
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).complete(request).await
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        (**self).complete_stream(request).await
    }
}
