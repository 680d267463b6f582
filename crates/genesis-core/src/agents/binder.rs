//! The argument-binder sub-call.
//!
//! When the executor cannot bind a tool parameter mechanically (no
//! user-supplied value, no compatible prior output or attachment), it
//! asks the model to propose values from the conversation context. The
//! binder must not invent: a parameter the conversation does not
//! determine stays absent, which is what triggers the clarification
//! loop.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use genesis_types::{Node, Result, ToolParam, ToolSpec};

use super::AgentRuntime;

const SYSTEM_PROMPT: &str = r#"You bind tool parameters from conversation context.

You receive a tool's parameter schema, the parameters still unbound, and
the conversation so far. Reply with ONLY a JSON object:
{
  "values": { "<param_name>": <value>, ... }
}

Include a parameter ONLY when the conversation clearly states its value.
Never guess or fabricate; omit anything uncertain. An empty "values"
object is a valid answer."#;

/// Structured output of the binder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Binding {
    #[serde(default)]
    pub values: Map<String, Value>,
}

/// Propose values for the given unbound parameters.
pub async fn bind_params(
    runtime: &AgentRuntime<'_>,
    tool: &ToolSpec,
    unbound: &[&ToolParam],
    message: &str,
    objective: &str,
    feedback: Option<&str>,
) -> Result<Binding> {
    let payload = json!({
        "tool": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.params_schema(),
        },
        "unbound": unbound.iter().map(|p| &p.name).collect::<Vec<_>>(),
        "objective": objective,
        "message": message,
        "user_reply": feedback,
    })
    .to_string();

    runtime
        .call_structured(Node::Execute, SYSTEM_PROMPT, payload, vec![])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;
    use crate::registry::RegistryBuilder;
    use genesis_llm::{ScriptStep, ScriptedProvider};
    use genesis_types::{ParamKind, WorkflowType};
    use std::time::Duration;

    fn overlay_tool() -> ToolSpec {
        ToolSpec {
            name: "image_overlay".into(),
            description: "Draw a caption onto an image".into(),
            input_type: WorkflowType::Text,
            output_type: WorkflowType::Image,
            params: vec![ToolParam::required(
                "caption_text",
                ParamKind::Str,
                "The caption to draw",
            )],
            preferred: 0,
        }
    }

    #[tokio::test]
    async fn proposes_only_stated_values() {
        let provider = ScriptedProvider::new(vec![ScriptStep::reply(
            r#"{"values": {"caption_text": "Hello World"}}"#,
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

        let tool = overlay_tool();
        let param = tool.param("caption_text").unwrap();
        let binding = bind_params(
            &runtime,
            &tool,
            &[param],
            "add a caption",
            "caption the image",
            Some("Hello World"),
        )
        .await
        .unwrap();
        assert_eq!(binding.values["caption_text"], "Hello World");

        let sent = provider.requests();
        assert!(sent[0].messages[1].content.contains("caption_text"));
        assert!(sent[0].messages[1].content.contains("Hello World"));
    }

    #[tokio::test]
    async fn empty_values_is_valid() {
        let provider = ScriptedProvider::new(vec![ScriptStep::reply(r#"{"values": {}}"#)]);
        let (events, _stream) = EventSender::channel();
        let registry = RegistryBuilder::new().build();
        let runtime = AgentRuntime {
            provider: &provider,
            events: &events,
            registry: &registry,
            llm_timeout: Duration::from_secs(5),
            dev_mode: false,
        };

        let tool = overlay_tool();
        let param = tool.param("caption_text").unwrap();
        let binding = bind_params(&runtime, &tool, &[param], "add a caption", "", None)
            .await
            .unwrap();
        assert!(binding.values.is_empty());
    }
}
