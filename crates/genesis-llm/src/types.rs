//! Request and response types for LLM chat completion calls.
//!
//! These types mirror the OpenAI chat completion format, the de facto
//! interchange shape across providers. Responses additionally carry a
//! `reasoning_content` channel: providers that stream chain-of-thought
//! separately from the final payload surface it there.

use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model during its reasoning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Identifier the tool result must echo back.
    pub id: String,
    /// Name of the agent tool to invoke.
    pub name: String,
    /// The arguments as a JSON string.
    pub arguments: String,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// The role of the message author ("system", "user", "assistant",
    /// "tool").
    pub role: String,

    /// The content of the message. For "tool" messages this is the
    /// serialized tool result.
    pub content: String,

    /// For tool-result messages, the ID of the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool invocations requested by the assistant in this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    /// Create a message with role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Create an assistant message that requests tool invocations.
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            tool_call_id: None,
            tool_calls,
        }
    }

    /// Create a tool-result message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// A chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model identifier. Empty means the provider's default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// The conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Agent tool definitions available to the model, in function-calling
    /// schema form.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
}

impl ChatRequest {
    /// Create a minimal chat request.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: String::new(),
            messages,
            max_tokens: None,
            temperature: None,
            tools: Vec::new(),
        }
    }

    /// Attach agent tool schemas.
    pub fn with_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        self.tools = tools;
        self
    }
}

/// A complete (non-streamed) chat response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    /// The final assistant content — for agent calls, the structured
    /// JSON payload.
    pub content: String,

    /// Free-form reasoning emitted alongside the content, if the
    /// provider exposes a separate reasoning channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Tool invocations the model wants executed before it can finish.
    /// Non-empty means the caller must run them and continue the
    /// conversation with their results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage statistics for a completion request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One delta in a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A partial token on the reasoning channel.
    ReasoningDelta(String),

    /// A partial token on the content channel.
    TextDelta(String),

    /// A fully-assembled tool invocation request.
    ToolCall(ToolCall),

    /// The stream is complete.
    Done {
        /// Why generation stopped, when the provider reports it.
        finish_reason: Option<String>,
        /// Usage from the final chunk, when available.
        usage: Option<Usage>,
    },
}
