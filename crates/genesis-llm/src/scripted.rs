//! A scripted provider for tests and offline runs.
//!
//! [`ScriptedProvider`] pops a queue of [`ScriptStep`]s, one per
//! `complete` call, and records every request it receives. Agent and
//! orchestrator tests script the exact structured payloads each node
//! should see; retry tests script transient failures.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::types::{ChatRequest, ChatResponse, ToolCall};

/// One scripted provider interaction.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Reply with content and optional reasoning.
    Reply {
        content: String,
        reasoning: Option<String>,
    },
    /// Reply requesting tool invocations.
    CallTools(Vec<ToolCall>),
    /// Fail with a retryable transport error.
    FailRetryable(String),
    /// Fail with a permanent error.
    FailPermanent(String),
}

impl ScriptStep {
    /// A plain reply with no reasoning channel.
    pub fn reply(content: impl Into<String>) -> Self {
        ScriptStep::Reply {
            content: content.into(),
            reasoning: None,
        }
    }

    /// A reply that also streams reasoning.
    pub fn reply_with_reasoning(
        content: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        ScriptStep::Reply {
            content: content.into(),
            reasoning: Some(reasoning.into()),
        }
    }

    /// A reply requesting a single tool invocation.
    pub fn call_tool(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        ScriptStep::CallTools(vec![ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }])
    }

    /// A transient failure ([`ProviderError::RequestFailed`]).
    pub fn fail_retryable(message: impl Into<String>) -> Self {
        ScriptStep::FailRetryable(message.into())
    }

    /// A permanent failure ([`ProviderError::AuthFailed`]).
    pub fn fail_permanent(message: impl Into<String>) -> Self {
        ScriptStep::FailPermanent(message.into())
    }
}

/// A provider that replays a fixed script.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    /// Create a provider that will play `steps` in order.
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a step to the script.
    pub fn push(&self, step: ScriptStep) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Number of unconsumed steps.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;
        match step {
            ScriptStep::Reply { content, reasoning } => Ok(ChatResponse {
                content,
                reasoning,
                tool_calls: Vec::new(),
                usage: None,
            }),
            ScriptStep::CallTools(tool_calls) => Ok(ChatResponse {
                content: String::new(),
                reasoning: None,
                tool_calls,
                usage: None,
            }),
            ScriptStep::FailRetryable(msg) => Err(ProviderError::RequestFailed(msg)),
            ScriptStep::FailPermanent(msg) => Err(ProviderError::AuthFailed(msg)),
        }
    }
}
