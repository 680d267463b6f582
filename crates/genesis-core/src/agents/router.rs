//! The Router agent.
//!
//! Sees every candidate path with full parameter schemas and picks the
//! one to execute, or asks the user when the choice is genuinely
//! ambiguous. `is_partial` signals that the selected path will need
//! user-supplied arguments the conversation does not yet contain.

use serde::{Deserialize, Serialize};
use serde_json::json;

use genesis_types::{ConversationState, Node, PathCandidate, Result};

use super::AgentRuntime;

const SYSTEM_PROMPT: &str = r#"You are the path router of a multimodal assistant.

You receive the user's objective and a numbered list of candidate tool
chains, each with its tools' parameter schemas. Reply with ONLY a JSON object:
{
  "chosen_path": <index of the best candidate, or null if none fits>,
  "is_partial": <true if the chosen chain has required parameters the
                 conversation does not yet provide>,
  "reasoning": "<one or two sentences>",
  "clarification": "<a question for the user, ONLY if you cannot choose>"
}

Prefer the shortest chain that fully serves the objective."#;

/// Structured output of the Router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub chosen_path: Option<usize>,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub clarification: Option<String>,
}

impl Route {
    /// Resolve the chosen index against the candidate list.
    pub fn resolve<'a>(&self, all_paths: &'a [PathCandidate]) -> Option<&'a PathCandidate> {
        self.chosen_path.and_then(|i| all_paths.get(i))
    }
}

/// Run the Router over the enumerated candidates.
pub async fn route(runtime: &AgentRuntime<'_>, state: &ConversationState) -> Result<Route> {
    let candidates: Vec<_> = state
        .all_paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            json!({
                "index": i,
                "chain": path.display(),
                "tools": path.steps.iter().map(|t| json!({
                    "name": t.name,
                    "description": t.description,
                    "input_type": t.input_type,
                    "output_type": t.output_type,
                    "parameters": t.params_schema(),
                })).collect::<Vec<_>>(),
            })
        })
        .collect();

    let payload = json!({
        "objective": state.objective,
        "message": state.message,
        "candidates": candidates,
    })
    .to_string();

    let mut route: Route = runtime
        .call_structured(Node::Route, SYSTEM_PROMPT, payload, vec![])
        .await?;
    if route
        .clarification
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        route.clarification = None;
    }
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;
    use crate::registry::RegistryBuilder;
    use genesis_llm::{ScriptStep, ScriptedProvider};
    use genesis_types::{ToolSpec, WorkflowType};
    use std::time::Duration;

    fn candidate(names: &[&str]) -> PathCandidate {
        PathCandidate::new(
            names
                .iter()
                .map(|n| ToolSpec {
                    name: n.to_string(),
                    description: format!("{n} tool"),
                    input_type: WorkflowType::Image,
                    output_type: WorkflowType::Text,
                    params: vec![],
                    preferred: 0,
                })
                .collect(),
        )
    }

    fn state_with_paths() -> ConversationState {
        let mut state = ConversationState::new("c1", "m1", "translate to English", vec![]);
        state.objective = "translate sign".into();
        state.all_paths = vec![candidate(&["image_ocr"]), candidate(&["image_describe"])];
        state
    }

    #[tokio::test]
    async fn picks_a_candidate_by_index() {
        let provider = ScriptedProvider::new(vec![ScriptStep::reply(
            r#"{"chosen_path": 0, "is_partial": false, "reasoning": "direct ocr"}"#,
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

        let state = state_with_paths();
        let route = route(&runtime, &state).await.unwrap();
        let chosen = route.resolve(&state.all_paths).unwrap();
        assert_eq!(chosen.display(), "image_ocr");
        assert!(!route.is_partial);

        // The router saw parameter schemas for every candidate.
        let sent = provider.requests();
        assert!(sent[0].messages[1].content.contains("parameters"));
        assert!(sent[0].messages[1].content.contains("image_describe"));
    }

    #[tokio::test]
    async fn clarification_without_choice() {
        let provider = ScriptedProvider::new(vec![ScriptStep::reply(
            r#"{"chosen_path": null, "clarification": "Do you want plain text or a file?"}"#,
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

        let state = state_with_paths();
        let route = route(&runtime, &state).await.unwrap();
        assert!(route.resolve(&state.all_paths).is_none());
        assert_eq!(
            route.clarification.as_deref(),
            Some("Do you want plain text or a file?")
        );
    }

    #[tokio::test]
    async fn out_of_range_index_resolves_to_none() {
        let route = Route {
            chosen_path: Some(9),
            is_partial: false,
            reasoning: String::new(),
            clarification: None,
        };
        let state = state_with_paths();
        assert!(route.resolve(&state.all_paths).is_none());
    }
}
