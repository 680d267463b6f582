//! LLM-backed translation tool.
//!
//! `translate` is the one built-in whose transformation is itself a
//! model call: it takes the chain's text and produces the same text in
//! the target language. The handler owns its provider handle, so the
//! registry stays free of LLM plumbing.

use std::sync::Arc;

use async_trait::async_trait;

use genesis_core::{ToolError, ToolHandler, ToolInvocation, ToolOutput};
use genesis_llm::{ChatMessage, ChatRequest, Provider};
use genesis_types::{ParamKind, ToolParam, ToolSpec, WorkflowType};

const SYSTEM_PROMPT: &str =
    "You are a translator. Reply with ONLY the translation of the user's text \
     into the requested language, no commentary.";

/// Metadata for `translate`.
pub fn translate_spec() -> ToolSpec {
    ToolSpec {
        name: "translate".into(),
        description: "Translate text into a target language".into(),
        input_type: WorkflowType::Text,
        output_type: WorkflowType::Text,
        params: vec![
            ToolParam::required("text", ParamKind::Str, "The text to translate"),
            ToolParam::optional(
                "target_language",
                ParamKind::Str,
                "Language to translate into",
                Some("English".into()),
            ),
        ],
        preferred: 1,
    }
}

/// Handler for `translate`.
pub struct TranslateTool {
    provider: Arc<dyn Provider>,
}

impl TranslateTool {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ToolHandler for TranslateTool {
    async fn run(&self, inv: ToolInvocation<'_>) -> Result<ToolOutput, ToolError> {
        let text = inv.str_arg("text")?;
        let target = inv.opt_str_arg("target_language").unwrap_or("English");

        inv.emit(format!("translating {} chars to {target}", text.len()));
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("Target language: {target}\n\n{text}")),
        ]);
        let response = self
            .provider
            .complete(&request)
            .await
            .map_err(|e| ToolError::Transient(e.to_string()))?;

        Ok(ToolOutput::Value(response.content.trim().to_string().into()))
    }
}
