//! LLM-backed agents.
//!
//! Each agent is a function from a slice of conversation state to a
//! structured result, implemented as one provider conversation with a
//! fixed system prompt and a JSON payload the model must conform to.
//! Reasoning tokens stream out on the `messages` channel as they
//! arrive. When the model requests an agent tool mid-reasoning, the
//! runtime executes it against the registry and feeds the result back,
//! up to a bounded number of rounds. The terminal content is parsed
//! (with repair) into the agent's output type; a payload that fails to
//! parse gets exactly one corrective retry before the call is declared
//! failed.

pub mod binder;
pub mod classifier;
pub mod finalizer;
pub mod router;

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use genesis_llm::{ChatMessage, ChatRequest, Provider, StreamChunk, ToolCall};
use genesis_types::{Event, GenesisError, Node, Result};

use crate::events::EventSender;
use crate::json_repair::parse_with_repair;
use crate::registry::ToolRegistry;

pub use binder::{bind_params, Binding};
pub use classifier::{classify, Classification};
pub use finalizer::{finalize, Finalization};
pub use router::{route, Route};

/// Upper bound on tool-call rounds within one agent call.
const MAX_TOOL_ROUNDS: u32 = 4;

/// Shared plumbing for one agent call.
pub struct AgentRuntime<'a> {
    pub provider: &'a dyn Provider,
    pub events: &'a EventSender,
    /// Source of agent tool handlers for mid-reasoning dispatch.
    pub registry: &'a ToolRegistry,
    pub llm_timeout: Duration,
    /// When set, content tokens are streamed to the UI alongside
    /// reasoning tokens.
    pub dev_mode: bool,
}

/// What one streamed provider turn produced.
struct StreamedReply {
    content: String,
    tool_calls: Vec<ToolCall>,
}

impl AgentRuntime<'_> {
    /// Run one schema-bound agent call.
    ///
    /// Streams the provider response, forwarding `reasoning_content`
    /// deltas as `messages` events tagged with `node`. Requested agent
    /// tools are executed and their results appended to the
    /// conversation until the model produces a terminal payload (or the
    /// round bound trips). The payload is parsed into `T`; on a parse
    /// failure it is sent back once with a corrective instruction, and
    /// a second failure is surfaced as [`GenesisError::LlmUnavailable`].
    pub async fn call_structured<T: DeserializeOwned>(
        &self,
        node: Node,
        system_prompt: &str,
        user_payload: String,
        tools: Vec<Value>,
    ) -> Result<T> {
        let started = Instant::now();
        let mut messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_payload),
        ];

        let mut rounds = 0u32;
        let reply = loop {
            let request = ChatRequest::new(messages.clone()).with_tools(tools.clone());
            let reply = self.stream_call(node, &request).await?;
            if reply.tool_calls.is_empty() {
                break reply;
            }

            rounds += 1;
            if rounds >= MAX_TOOL_ROUNDS {
                return Err(GenesisError::LlmUnavailable {
                    message: format!("agent exceeded {MAX_TOOL_ROUNDS} tool-call rounds"),
                });
            }

            messages.push(ChatMessage::assistant_with_calls(
                reply.content.clone(),
                reply.tool_calls.clone(),
            ));
            for call in &reply.tool_calls {
                let result = self.dispatch_agent_tool(call).await;
                messages.push(ChatMessage::tool(&call.id, result));
            }
        };

        self.events
            .send(Event::think_duration(node, started.elapsed().as_nanos()))
            .await;

        match parse_payload::<T>(&reply.content) {
            Ok(parsed) => Ok(parsed),
            Err(parse_err) => {
                warn!(node = %node, error = %parse_err, "structured payload malformed, retrying once");
                messages.push(ChatMessage::assistant(reply.content));
                messages.push(ChatMessage::user(format!(
                    "Your reply did not match the required JSON schema ({parse_err}). \
                     Reply again with only the corrected JSON object."
                )));
                let retry_request = ChatRequest::new(messages).with_tools(tools);
                let content = self.plain_call(&retry_request).await?;
                parse_payload::<T>(&content).map_err(|e| GenesisError::LlmUnavailable {
                    message: format!("schema mismatch after retry: {e}"),
                })
            }
        }
    }

    /// Execute one requested agent tool, returning the JSON string fed
    /// back to the model. Failures are reported to the model rather
    /// than aborting the agent call.
    async fn dispatch_agent_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.registry.agent_tool(&call.name) else {
            warn!(tool = %call.name, "model requested an unknown agent tool");
            return json!({"error": format!("unknown tool '{}'", call.name)}).to_string();
        };

        let args = match parse_with_repair(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                return json!({"error": format!("unparsable arguments: {e}")}).to_string();
            }
        };

        debug!(tool = %call.name, "dispatching agent tool");
        match tool.handler.call(args).await {
            Ok(result) => result.to_string(),
            Err(e) => json!({"error": e.to_string()}).to_string(),
        }
    }

    /// Stream a request, emitting reasoning events, returning the
    /// accumulated content and any tool-call requests.
    async fn stream_call(&self, node: Node, request: &ChatRequest) -> Result<StreamedReply> {
        use futures_util::StreamExt;

        let fut = async {
            let mut stream = self
                .provider
                .complete_stream(request)
                .await
                .map_err(provider_err)?;
            let mut content = String::new();
            let mut tool_calls = Vec::new();
            while let Some(chunk) = stream.next().await {
                // A gone consumer aborts the stream at the next token
                // boundary; the machine loop seals the cancellation.
                if self.events.is_closed() {
                    break;
                }
                match chunk.map_err(provider_err)? {
                    StreamChunk::ReasoningDelta(text) => {
                        self.events
                            .send(Event::message_chunk(node, &text, true))
                            .await;
                    }
                    StreamChunk::TextDelta(text) => {
                        if self.dev_mode {
                            self.events
                                .send(Event::message_chunk(node, &text, false))
                                .await;
                        }
                        content.push_str(&text);
                    }
                    StreamChunk::ToolCall(call) => tool_calls.push(call),
                    StreamChunk::Done { .. } => break,
                }
            }
            Ok(StreamedReply {
                content,
                tool_calls,
            })
        };

        match tokio::time::timeout(self.llm_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GenesisError::LlmUnavailable {
                message: format!("llm call exceeded {}s", self.llm_timeout.as_secs()),
            }),
        }
    }

    /// Non-streaming call used for the corrective retry.
    async fn plain_call(&self, request: &ChatRequest) -> Result<String> {
        match tokio::time::timeout(self.llm_timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => Err(provider_err(e)),
            Err(_) => Err(GenesisError::LlmUnavailable {
                message: format!("llm call exceeded {}s", self.llm_timeout.as_secs()),
            }),
        }
    }
}

fn provider_err(e: genesis_llm::ProviderError) -> GenesisError {
    GenesisError::LlmUnavailable {
        message: e.to_string(),
    }
}

fn parse_payload<T: DeserializeOwned>(content: &str) -> std::result::Result<T, String> {
    let value = parse_with_repair(content).map_err(|e| e.to_string())?;
    debug!("structured payload parsed");
    serde_json::from_value(value).map_err(|e| e.to_string())
}
