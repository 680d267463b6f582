//! The Finalizer agent.
//!
//! Composes the user-facing reply from the execution results, citing
//! produced artifacts with `<file>` references.

use serde::{Deserialize, Serialize};
use serde_json::json;

use genesis_types::{ConversationState, Node, Result};

use super::AgentRuntime;

const SYSTEM_PROMPT: &str = r#"You are the finalizer of a multimodal assistant.

You receive the objective, the executed tool chain with its outputs, and
the final artifact path. Reply with ONLY a JSON object:
{
  "response": "<the reply shown to the user; reference produced artifacts
               as <file>PATH</file>>",
  "summary": "<one sentence describing what was done>",
  "reasoning": "<one or two sentences>"
}

Quote concrete results (extracted text, translations) directly in the
response rather than describing them abstractly."#;

/// Structured output of the Finalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finalization {
    pub response: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Run the Finalizer over the completed execution.
pub async fn finalize(runtime: &AgentRuntime<'_>, state: &ConversationState) -> Result<Finalization> {
    let steps: Vec<_> = state
        .execution_results
        .iter()
        .map(|r| {
            json!({
                "tool": r.tool,
                "status": r.status,
                "output_path": r.output_path,
                "duration_ms": r.duration_ms,
            })
        })
        .collect();

    let payload = json!({
        "objective": state.objective,
        "message": state.message,
        "steps": steps,
        "final_output_path": state.execution_output_path,
    })
    .to_string();

    runtime
        .call_structured(Node::Finalize, SYSTEM_PROMPT, payload, vec![])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;
    use crate::registry::RegistryBuilder;
    use genesis_llm::{ScriptStep, ScriptedProvider};
    use genesis_types::{ExecutionRecord, StepStatus};
    use std::path::PathBuf;
    use std::time::Duration;

    #[tokio::test]
    async fn finalization_sees_execution_results() {
        let provider = ScriptedProvider::new(vec![ScriptStep::reply(
            r#"{"response": "Done: <file>/tmp/out.txt</file>", "summary": "translated sign"}"#,
        )]);
        let (events, _stream) = EventSender::channel();
        let registry = RegistryBuilder::new().build();
        let runtime = AgentRuntime {
            provider: &provider,
            events: &events,
            registry: &registry,
            llm_timeout: Duration::from_secs(5),
            dev_mode: false,
        };

        let mut state = ConversationState::new("c1", "m1", "translate", vec![]);
        state.objective = "translate sign".into();
        state.execution_results.push(ExecutionRecord {
            tool: "image_ocr".into(),
            args: serde_json::json!({}),
            status: StepStatus::Ok,
            output_path: Some(PathBuf::from("/tmp/0_image_ocr/out.txt")),
            mime: Some("text/plain".into()),
            stderr_tail: None,
            duration_ms: 42,
        });
        state.execution_output_path = Some(PathBuf::from("/tmp/out.txt"));

        let result = finalize(&runtime, &state).await.unwrap();
        assert!(result.response.contains("<file>"));
        assert_eq!(result.summary, "translated sign");

        let sent = provider.requests();
        assert!(sent[0].messages[1].content.contains("image_ocr"));
        assert!(sent[0].messages[1].content.contains("final_output_path"));
    }
}
