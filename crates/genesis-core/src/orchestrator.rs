//! The orchestrator state machine.
//!
//! One message travels `start -> classify -> precedent -> {route |
//! find_path -> route} -> execute -> finalize -> complete`, with
//! loop-backs into `waiting_for_feedback` whenever an agent asks the
//! user something. Every node transition checkpoints the state and emits
//! an `updates` event; every terminal outcome emits a `persisted`
//! envelope after all other events for the message.
//!
//! [`Genesis`] is the entry surface: `process_message` starts a machine
//! for a fresh user message, `resume` feeds a reply into whichever node
//! suspended. Each call returns the message's event stream; the machine
//! itself runs on a spawned task so many conversations proceed in
//! parallel, each internally sequential.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use genesis_llm::{Provider, RetryLimits, RetryPolicy};
use genesis_types::{
    Attachment, ConversationState, Event, GenesisConfig, GenesisError, MessageType, Node,
    PrecedentRecord, Result,
};

use crate::agents::{self, AgentRuntime};
use crate::events::{EventSender, EventStream};
use crate::executor::{ExecOutcome, Executor};
use crate::planner::find_paths;
use crate::precedent::PrecedentStore;
use crate::registry::ToolRegistry;
use crate::state_store::{StateStore, Suspended};
use crate::workspace::MessageWorkspace;

/// The orchestrator.
pub struct Genesis {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<ToolRegistry>,
    provider: Arc<dyn Provider>,
    precedents: Arc<PrecedentStore>,
    states: Arc<StateStore>,
    config: GenesisConfig,
    /// One cancel token per conversation's in-flight message.
    cancels: Mutex<HashMap<String, CancellationToken>>,
}

impl Genesis {
    /// Assemble the orchestrator. The provider is wrapped in the
    /// default retry policy; pass a pre-wrapped provider to tune it.
    pub fn new(
        registry: Arc<ToolRegistry>,
        provider: Arc<dyn Provider>,
        precedents: Arc<PrecedentStore>,
        config: GenesisConfig,
    ) -> Self {
        let provider: Arc<dyn Provider> =
            Arc::new(RetryPolicy::new(provider, RetryLimits::default()));
        Self {
            inner: Arc::new(Inner {
                registry,
                provider,
                precedents,
                states: Arc::new(StateStore::new()),
                config,
                cancels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The state store (checkpoints and suspension table).
    pub fn states(&self) -> &Arc<StateStore> {
        &self.inner.states
    }

    /// Process a new user message; returns its event stream.
    ///
    /// With `interrupted` set, the message is treated as feedback for a
    /// suspended node, exactly like [`resume`](Self::resume).
    pub async fn process_message(
        &self,
        conversation_id: &str,
        text: &str,
        attachments: Vec<Attachment>,
        interrupted: bool,
    ) -> EventStream {
        if interrupted {
            return self.resume(conversation_id, text, attachments).await;
        }
        let (events, stream) = EventSender::channel();
        let cancel = self.fresh_cancel(conversation_id).await;
        let inner = self.inner.clone();
        let conversation_id = conversation_id.to_string();
        let text = text.to_string();
        tokio::spawn(async move {
            let state = ConversationState::new(
                &conversation_id,
                Uuid::new_v4().to_string(),
                text,
                attachments,
            );
            run_message(inner, events, state, cancel, Map::new(), None).await;
        });
        stream
    }

    /// Feed a reply into the node that suspended for this conversation.
    pub async fn resume(
        &self,
        conversation_id: &str,
        feedback: &str,
        attachments: Vec<Attachment>,
    ) -> EventStream {
        let (events, stream) = EventSender::channel();
        let cancel = self.fresh_cancel(conversation_id).await;
        let inner = self.inner.clone();
        let conversation_id = conversation_id.to_string();
        let feedback = feedback.to_string();
        tokio::spawn(async move {
            let Some(suspended) = inner.states.take_suspended(&conversation_id).await else {
                warn!(conversation = %conversation_id, "resume with nothing suspended");
                events
                    .send(Event::error("nothing is waiting for feedback", None))
                    .await;
                events
                    .send(Event::persisted(
                        &Uuid::new_v4().to_string(),
                        MessageType::Response,
                    ))
                    .await;
                return;
            };

            let mut state = suspended.state;
            let resumed_node = state.node;
            state.next_node = resumed_node;
            state.attachments.extend(attachments);
            if !feedback.is_empty() {
                state.message = format!("{}\n[user reply] {}", state.message, feedback);
            }

            // A reply that answers a single missing parameter binds to it
            // directly; anything wider goes through the binder.
            let mut user_values = Map::new();
            if let [only] = suspended.missing_params.as_slice() {
                user_values.insert(only.clone(), Value::String(feedback.trim().to_string()));
            }

            info!(conversation = %state.conversation_id, node = %resumed_node, "resuming suspended machine");
            run_message(inner, events, state, cancel, user_values, Some(feedback)).await;
        });
        stream
    }

    /// Cancel the in-flight message of a conversation (client
    /// disconnect). The executor finishes its current step, then the
    /// state is sealed with `error_details="cancelled"`.
    pub async fn cancel(&self, conversation_id: &str) {
        if let Some(token) = self.inner.cancels.lock().await.get(conversation_id) {
            token.cancel();
        }
    }

    /// Save the conversation's last completed run as a precedent (the
    /// user's approval signal). Returns the record, or `None` when the
    /// conversation has no completed tool run to save.
    pub async fn save_precedent(&self, conversation_id: &str) -> Result<Option<PrecedentRecord>> {
        let Some(state) = self.inner.states.latest_in_conversation(conversation_id).await else {
            return Ok(None);
        };
        if !state.is_complete || state.error_details.is_some() {
            return Ok(None);
        }
        let Some(path) = state.chosen_path else {
            return Ok(None);
        };
        let Some(output_type) = state.type_savepoint.last().copied() else {
            return Ok(None);
        };
        let record = self
            .inner
            .precedents
            .save(
                &state.objective,
                state.input_type,
                output_type,
                path,
                conversation_id,
            )
            .await?;
        Ok(Some(record))
    }

    async fn fresh_cancel(&self, conversation_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.inner
            .cancels
            .lock()
            .await
            .insert(conversation_id.to_string(), token.clone());
        token
    }
}

// ── The per-message machine ──────────────────────────────────────────

async fn run_message(
    inner: Arc<Inner>,
    events: EventSender,
    mut state: ConversationState,
    cancel: CancellationToken,
    user_values: Map<String, Value>,
    feedback: Option<String>,
) {
    let workspace = match MessageWorkspace::create(
        &inner.config.workspace_root,
        &state.conversation_id,
        &state.message_id,
    )
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            fail(&inner, &events, &mut state, e).await;
            return;
        }
    };

    let budget = Duration::from_secs(inner.config.message_timeout_s);
    let ended = tokio::time::timeout(
        budget,
        machine_loop(
            &inner,
            &events,
            &mut state,
            &workspace,
            &cancel,
            user_values,
            feedback,
        ),
    )
    .await;

    match ended {
        Ok(Ending::Terminal) => {
            let _ = workspace.cleanup(inner.config.keep_workspace).await;
        }
        Ok(Ending::Suspended) => {
            // The workspace stays: completed step outputs feed the
            // resumed machine.
        }
        Err(_) => {
            warn!(message = %state.message_id, "message wall-clock budget exceeded");
            fail(
                &inner,
                &events,
                &mut state,
                GenesisError::InvariantViolation {
                    reason: format!(
                        "message exceeded {}s wall-clock budget",
                        inner.config.message_timeout_s
                    ),
                },
            )
            .await;
            let _ = workspace.cleanup(inner.config.keep_workspace).await;
        }
    }
}

enum Ending {
    /// Completed or failed; the terminal `persisted` has been emitted.
    Terminal,
    /// Parked at `waiting_for_feedback`.
    Suspended,
}

#[allow(clippy::too_many_arguments)]
async fn machine_loop(
    inner: &Inner,
    events: &EventSender,
    state: &mut ConversationState,
    workspace: &MessageWorkspace,
    cancel: &CancellationToken,
    user_values: Map<String, Value>,
    feedback: Option<String>,
) -> Ending {
    let runtime = AgentRuntime {
        provider: inner.provider.as_ref(),
        events,
        registry: &inner.registry,
        llm_timeout: Duration::from_secs(inner.config.llm_timeout_s),
        dev_mode: inner.config.dev_mode,
    };
    let mut iterations: HashMap<Node, u32> = HashMap::new();

    loop {
        if cancel.is_cancelled() || events.is_closed() {
            seal_cancelled(inner, events, state).await;
            return Ending::Terminal;
        }

        let node = state.next_node;
        let visits = iterations.entry(node).or_insert(0);
        *visits += 1;
        if *visits > inner.config.iter_budget_per_node {
            fail(
                inner,
                events,
                state,
                GenesisError::InvariantViolation {
                    reason: format!(
                        "node {node} exceeded its iteration budget of {}",
                        inner.config.iter_budget_per_node
                    ),
                },
            )
            .await;
            return Ending::Terminal;
        }

        match node {
            Node::Classify => {
                let classification = match agents::classify(
                    &runtime,
                    state,
                    inner.registry.agent_tool_schemas(),
                )
                .await
                {
                    Ok(c) => c,
                    Err(e) => {
                        fail(inner, events, state, e).await;
                        return Ending::Terminal;
                    }
                };

                state.objective = classification.objective.clone();
                state.input_type = classification.input_type;
                state.is_complex = classification.is_complex;
                state.satisfying_output_types =
                    classification.satisfying_output_types.clone();
                state.classify_reasoning = Some(classification.reasoning.clone());
                state.classify_clarification = classification.clarification.clone();

                if let Some(question) = classification.clarification {
                    return suspend(inner, events, state, Node::Classify, question, vec![])
                        .await;
                }

                if !classification.is_complex {
                    state.response = classification
                        .response
                        .or_else(|| Some("How can I help?".into()));
                    state.next_node = Node::Complete;
                } else {
                    state.next_node = Node::Precedent;
                }
                checkpoint(
                    inner,
                    events,
                    state,
                    Node::Classify,
                    json!({
                        "objective": state.objective,
                        "input_type": state.input_type,
                        "is_complex": state.is_complex,
                        "satisfying_output_types": state.satisfying_output_types,
                    }),
                )
                .await;
            }

            Node::Precedent => {
                let matched = match inner
                    .precedents
                    .best_match(&state.objective, state.input_type, &inner.registry)
                    .await
                {
                    Ok(m) => m,
                    Err(e) => {
                        fail(inner, events, state, e).await;
                        return Ending::Terminal;
                    }
                };

                let mut delta = json!({"hit": false});
                match matched {
                    Some(hit) if hit.score >= inner.config.precedent_threshold => {
                        debug!(score = hit.score, objective = %hit.record.objective, "precedent hit");
                        state.all_paths = vec![hit.record.path.clone()];
                        state.next_node = Node::Route;
                        delta = json!({
                            "hit": true,
                            "score": hit.score,
                            "precedent_objective": hit.record.objective,
                        });
                    }
                    _ => {
                        state.next_node = Node::FindPath;
                    }
                }
                checkpoint(inner, events, state, Node::Precedent, delta).await;
            }

            Node::FindPath => {
                match find_paths(
                    &inner.registry,
                    state.input_type,
                    &state.satisfying_output_types,
                    inner.config.max_path_depth,
                    inner.config.max_paths,
                ) {
                    Ok(paths) => {
                        events
                            .send(Event::path_progress(
                                paths.len(),
                                inner.config.max_path_depth,
                            ))
                            .await;
                        state.all_paths = paths;
                        state.next_node = Node::Route;
                        checkpoint(
                            inner,
                            events,
                            state,
                            Node::FindPath,
                            json!({"candidates": state.all_paths.len()}),
                        )
                        .await;
                    }
                    Err(e) => {
                        fail(inner, events, state, e).await;
                        return Ending::Terminal;
                    }
                }
            }

            Node::Route => {
                let route = match agents::route(&runtime, state).await {
                    Ok(r) => r,
                    Err(e) => {
                        fail(inner, events, state, e).await;
                        return Ending::Terminal;
                    }
                };
                state.route_reasoning = Some(route.reasoning.clone());
                state.is_partial = route.is_partial;

                if let Some(question) = route.clarification.clone() {
                    state.route_clarification = Some(question.clone());
                    return suspend(inner, events, state, Node::Route, question, vec![]).await;
                }

                let Some(chosen) = route.resolve(&state.all_paths).cloned() else {
                    let question =
                        "I couldn't pick a workflow for that. Could you say more about what you want?"
                            .to_string();
                    state.route_clarification = Some(question.clone());
                    return suspend(inner, events, state, Node::Route, question, vec![]).await;
                };

                if let Err(reason) = chosen.validate(state.input_type, &[]) {
                    fail(
                        inner,
                        events,
                        state,
                        GenesisError::InvariantViolation {
                            reason: format!("router chose a non-composing path: {reason}"),
                        },
                    )
                    .await;
                    return Ending::Terminal;
                }

                state.chosen_path = Some(chosen);
                state.next_node = Node::Execute;
                checkpoint(
                    inner,
                    events,
                    state,
                    Node::Route,
                    json!({
                        "chosen_path": state.chosen_path.as_ref().map(|p| p.display()),
                        "is_partial": state.is_partial,
                    }),
                )
                .await;
            }

            Node::Execute => {
                let executor = Executor {
                    registry: &inner.registry,
                    config: &inner.config,
                    events,
                    agent_runtime: &runtime,
                    cancel,
                };
                let outcome = executor
                    .run(state, workspace, &user_values, feedback.as_deref())
                    .await;

                match outcome {
                    Ok(ExecOutcome::Completed) => {
                        state.next_node = Node::Finalize;
                        checkpoint(
                            inner,
                            events,
                            state,
                            Node::Execute,
                            json!({
                                "steps": state.execution_results.len(),
                                "type_savepoint": state.type_savepoint,
                                "output_path": state.execution_output_path,
                            }),
                        )
                        .await;
                    }
                    Ok(ExecOutcome::NeedsInput {
                        missing,
                        clarification,
                    }) => {
                        state.is_partial = true;
                        state.route_clarification = Some(clarification.clone());
                        return suspend(inner, events, state, Node::Execute, clarification, missing)
                            .await;
                    }
                    Ok(ExecOutcome::Cancelled) => {
                        seal_cancelled(inner, events, state).await;
                        return Ending::Terminal;
                    }
                    Err(e) => {
                        fail(inner, events, state, e).await;
                        return Ending::Terminal;
                    }
                }
            }

            Node::Finalize => {
                let finalization = match agents::finalize(&runtime, state).await {
                    Ok(f) => f,
                    Err(e) => {
                        fail(inner, events, state, e).await;
                        return Ending::Terminal;
                    }
                };
                state.response = Some(finalization.response);
                state.summary = Some(finalization.summary);
                state.finalize_reasoning = Some(finalization.reasoning);
                state.next_node = Node::Complete;
                checkpoint(
                    inner,
                    events,
                    state,
                    Node::Finalize,
                    json!({
                        "response": state.response,
                        "summary": state.summary,
                    }),
                )
                .await;
            }

            Node::Complete => {
                state.seal(Node::Complete, None);
                inner.states.checkpoint(state).await;
                events
                    .send(Event::persisted(
                        &assistant_message_id(state),
                        MessageType::Response,
                    ))
                    .await;
                info!(conversation = %state.conversation_id, "message complete");
                return Ending::Terminal;
            }

            Node::Start | Node::WaitingForFeedback | Node::Error => {
                fail(
                    inner,
                    events,
                    state,
                    GenesisError::InvariantViolation {
                        reason: format!("machine re-entered node {node}"),
                    },
                )
                .await;
                return Ending::Terminal;
            }
        }
    }
}

/// Bump, store, and announce a completed node.
async fn checkpoint(
    inner: &Inner,
    events: &EventSender,
    state: &mut ConversationState,
    node: Node,
    delta: Value,
) {
    state.node = node;
    state.bump();
    inner.states.checkpoint(state).await;
    events.send(Event::updates(node, delta, state.next_node)).await;
}

/// Park the machine at `waiting_for_feedback` and emit the question.
async fn suspend(
    inner: &Inner,
    events: &EventSender,
    state: &mut ConversationState,
    node: Node,
    question: String,
    missing_params: Vec<String>,
) -> Ending {
    state.node = node;
    state.next_node = Node::WaitingForFeedback;
    state.bump();
    inner.states.checkpoint(state).await;
    events
        .send(Event::updates(
            node,
            json!({"clarification": question}),
            Node::WaitingForFeedback,
        ))
        .await;
    inner
        .states
        .suspend(Suspended {
            state: state.clone(),
            missing_params,
        })
        .await;
    events
        .send(Event::persisted(
            &assistant_message_id(state),
            MessageType::Question,
        ))
        .await;
    debug!(conversation = %state.conversation_id, node = %node, "machine suspended");
    Ending::Suspended
}

/// Seal a failed message and emit the error plus terminal envelope.
async fn fail(inner: &Inner, events: &EventSender, state: &mut ConversationState, err: GenesisError) {
    error!(conversation = %state.conversation_id, error = %err, "message failed");
    let message = err.to_string();
    if state.response.is_none() {
        state.response = Some(format!("I couldn't finish that: {message}"));
    }
    state.seal(Node::Error, Some(message.clone()));
    inner.states.checkpoint(state).await;
    events.send(Event::error(&message, None)).await;
    events
        .send(Event::persisted(
            &assistant_message_id(state),
            MessageType::Response,
        ))
        .await;
}

async fn seal_cancelled(inner: &Inner, events: &EventSender, state: &mut ConversationState) {
    state.seal(Node::Error, Some("cancelled".into()));
    inner.states.checkpoint(state).await;
    events.send(Event::error("cancelled", None)).await;
    events
        .send(Event::persisted(
            &assistant_message_id(state),
            MessageType::Response,
        ))
        .await;
}

fn assistant_message_id(state: &ConversationState) -> String {
    format!("am-{}", state.message_id)
}
