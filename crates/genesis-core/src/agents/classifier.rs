//! The Classifier agent.
//!
//! First node of every message: distills the objective, detects the
//! input type, decides whether the request needs a tool workflow at all,
//! and names the output types that would satisfy the user.

use serde::{Deserialize, Serialize};
use serde_json::json;

use genesis_types::{ConversationState, Node, Result, WorkflowType};

use super::AgentRuntime;

const SYSTEM_PROMPT: &str = r#"You are the request classifier of a multimodal assistant.

Given the user's message and its attachments, reply with ONLY a JSON object:
{
  "objective": "<one short goal phrase restating what the user wants>",
  "input_type": "<IMAGE|AUDIO|VIDEO|TEXT|PDF|TEXT_FILE|TABLE|JSON|NONE>",
  "is_complex": <true if fulfilling this needs file-transforming tools, false for greetings and plain chat>,
  "satisfying_output_types": ["<types whose production would satisfy the user; empty if unsure>"],
  "reasoning": "<one or two sentences>",
  "clarification": "<a question for the user, ONLY if the request is too ambiguous to classify>",
  "response": "<a direct chat reply, ONLY when is_complex is false>"
}

Use the attachment MIME hints for input_type. A message with no attachments
has input_type TEXT when the text itself is the artifact, otherwise NONE."#;

/// Structured output of the Classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub objective: String,
    pub input_type: WorkflowType,
    #[serde(default)]
    pub is_complex: bool,
    #[serde(default)]
    pub satisfying_output_types: Vec<WorkflowType>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub clarification: Option<String>,
    /// Direct chat reply, used only for simple (non-complex) requests.
    #[serde(default)]
    pub response: Option<String>,
}

/// Run the Classifier over the current message.
pub async fn classify(
    runtime: &AgentRuntime<'_>,
    state: &ConversationState,
    agent_tools: Vec<serde_json::Value>,
) -> Result<Classification> {
    let attachments: Vec<_> = state
        .attachments
        .iter()
        .map(|a| {
            json!({
                "file_name": a.file_name,
                "mime_type": a.mime_type,
                "detected_type": a.workflow_type(),
            })
        })
        .collect();

    let payload = json!({
        "message": state.message,
        "attachments": attachments,
    })
    .to_string();

    let mut classification: Classification = runtime
        .call_structured(Node::Classify, SYSTEM_PROMPT, payload, agent_tools)
        .await?;

    // Empty clarifications are treated as absent.
    if classification
        .clarification
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        classification.clarification = None;
    }
    Ok(classification)
}
