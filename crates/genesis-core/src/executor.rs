//! Path executor: runs the chosen tool chain step by step.
//!
//! For each step the executor binds arguments from (in order) explicit
//! user-supplied values, prior step outputs, attachments, an LLM binder
//! proposal, and declared defaults; a required parameter that survives
//! all five sources suspends the machine with a clarification. Handlers
//! run under a wall-clock timeout inside their step workspace directory
//! with stdout tailed onto the event stream; what they produce is
//! checked against the tool's declared output type before the step is
//! accepted. Steps run strictly sequentially: a conversation never has
//! two handlers in flight.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use genesis_types::{
    ConversationState, Event, ExecutionRecord, GenesisConfig, GenesisError, ParamKind, Result,
    StepStatus, ToolParam, ToolSpec, WorkflowType,
};

use crate::agents::{bind_params, AgentRuntime};
use crate::events::EventSender;
use crate::registry::{RegisteredTool, ToolError, ToolInvocation, ToolOutput, ToolRegistry};
use crate::workspace::MessageWorkspace;

/// Retries for transient handler failures.
const TRANSIENT_RETRIES: u32 = 2;

/// Base backoff between transient retries.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Cap on chain content read into a string parameter.
const MAX_INLINE_CONTENT: u64 = 256 * 1024;

/// How one executor pass ended.
#[derive(Debug)]
pub enum ExecOutcome {
    /// Every remaining step ran.
    Completed,
    /// A required parameter could not be bound.
    NeedsInput {
        missing: Vec<String>,
        clarification: String,
    },
    /// The client went away; the current step was finished, the rest
    /// abandoned.
    Cancelled,
}

/// The executor for one message.
pub struct Executor<'a> {
    pub registry: &'a ToolRegistry,
    pub config: &'a GenesisConfig,
    pub events: &'a EventSender,
    pub agent_runtime: &'a AgentRuntime<'a>,
    pub cancel: &'a CancellationToken,
}

impl Executor<'_> {
    /// Run the chosen path from the first unexecuted step.
    ///
    /// `user_values` holds explicit parameter values gathered from the
    /// conversation (a clarification reply maps onto the missing
    /// parameter it answers); `feedback` is the raw reply text, given to
    /// the binder as context on resume.
    pub async fn run(
        &self,
        state: &mut ConversationState,
        workspace: &MessageWorkspace,
        user_values: &Map<String, Value>,
        feedback: Option<&str>,
    ) -> Result<ExecOutcome> {
        let path = state
            .chosen_path
            .clone()
            .ok_or_else(|| GenesisError::InvariantViolation {
                reason: "execute entered with no chosen path".into(),
            })?;

        if let Some(first) = path.steps.first() {
            if state.execution_results.is_empty() && first.input_type != state.input_type {
                return Err(GenesisError::InvariantViolation {
                    reason: format!(
                        "chosen path starts at {} but classified input is {}",
                        first.input_type, state.input_type
                    ),
                });
            }
        }

        let start_step = state.execution_results.len();
        for (index, tool) in path.steps.iter().enumerate().skip(start_step) {
            if self.cancel.is_cancelled() || self.events.is_closed() {
                return Ok(ExecOutcome::Cancelled);
            }

            let registered =
                self.registry
                    .lookup(&tool.name)
                    .ok_or_else(|| GenesisError::InvariantViolation {
                        reason: format!("chosen path references unknown tool '{}'", tool.name),
                    })?;

            let bound = self
                .bind_step_args(tool, state, user_values, feedback)
                .await?;
            let args = match bound {
                BindResult::Bound(args) => args,
                BindResult::Missing(missing) => {
                    let clarification = clarification_text(tool, &missing);
                    debug!(tool = %tool.name, ?missing, "suspending for user input");
                    return Ok(ExecOutcome::NeedsInput {
                        missing,
                        clarification,
                    });
                }
            };

            let step_dir = workspace.ensure_step_dir(index, &tool.name).await?;
            let record = self
                .invoke_with_retry(registered, tool, &args, &step_dir, index)
                .await;

            match record {
                Ok(record) => {
                    state.execution_output_path = record.output_path.clone();
                    state.execution_results.push(record);
                    state.type_savepoint.push(tool.output_type);
                }
                Err((record, err)) => {
                    state.execution_results.push(record);
                    return Err(err);
                }
            }
        }
        Ok(ExecOutcome::Completed)
    }

    // ── Argument binding ─────────────────────────────────────────────

    async fn bind_step_args(
        &self,
        tool: &ToolSpec,
        state: &ConversationState,
        user_values: &Map<String, Value>,
        feedback: Option<&str>,
    ) -> Result<BindResult> {
        let mut args = Map::new();
        let mut chain_content_used = false;

        for param in &tool.params {
            // (a) explicit user-supplied value.
            if let Some(value) = user_values.get(&param.name) {
                if let Some(coerced) = coerce(&param.kind, value) {
                    args.insert(param.name.clone(), coerced);
                    continue;
                }
            }

            // (b) prior step output / (c) attachment of a compatible type.
            match &param.kind {
                ParamKind::File { file_type } => {
                    if let Some(path) = self.find_artifact(state, *file_type) {
                        args.insert(param.name.clone(), Value::String(path));
                        continue;
                    }
                }
                ParamKind::Str if !chain_content_used => {
                    if matches!(tool.input_type, WorkflowType::Text | WorkflowType::TextFile) {
                        if let Some(content) = self.chain_text_content(state).await {
                            args.insert(param.name.clone(), Value::String(content));
                            chain_content_used = true;
                            continue;
                        }
                    }
                }
                _ => {}
            }
        }

        // (d) one binder sub-call for everything still unbound.
        let unbound: Vec<&ToolParam> = tool
            .params
            .iter()
            .filter(|p| !args.contains_key(&p.name))
            .collect();
        if !unbound.is_empty() {
            let binding = bind_params(
                self.agent_runtime,
                tool,
                &unbound,
                &state.message,
                &state.objective,
                feedback,
            )
            .await?;
            for param in &unbound {
                if let Some(value) = binding.values.get(&param.name) {
                    if let Some(coerced) = coerce(&param.kind, value) {
                        args.insert(param.name.clone(), coerced);
                    }
                }
            }
        }

        // (e) declared defaults.
        for param in &tool.params {
            if !args.contains_key(&param.name) {
                if let Some(default) = &param.default {
                    args.insert(param.name.clone(), default.clone());
                }
            }
        }

        let missing: Vec<String> = tool
            .params
            .iter()
            .filter(|p| p.required && !args.contains_key(&p.name))
            .map(|p| p.name.clone())
            .collect();
        if missing.is_empty() {
            Ok(BindResult::Bound(args))
        } else {
            Ok(BindResult::Missing(missing))
        }
    }

    /// Latest prior output of the given type, else a matching attachment.
    fn find_artifact(&self, state: &ConversationState, wanted: WorkflowType) -> Option<String> {
        for (record, produced) in state
            .execution_results
            .iter()
            .zip(state.type_savepoint.iter())
            .rev()
        {
            if *produced == wanted {
                if let Some(path) = &record.output_path {
                    return Some(path.to_string_lossy().into_owned());
                }
            }
        }
        state
            .attachments
            .iter()
            .find(|a| a.workflow_type() == Some(wanted))
            .map(|a| a.path.to_string_lossy().into_owned())
    }

    /// The chain's current text content: the latest TEXT/TEXT_FILE
    /// output read back, or the message itself at the first step.
    async fn chain_text_content(&self, state: &ConversationState) -> Option<String> {
        for (record, produced) in state
            .execution_results
            .iter()
            .zip(state.type_savepoint.iter())
            .rev()
        {
            if matches!(produced, WorkflowType::Text | WorkflowType::TextFile) {
                if let Some(path) = &record.output_path {
                    return read_capped(path).await;
                }
            }
        }
        if state.execution_results.is_empty() && state.input_type == WorkflowType::Text {
            return Some(state.message.clone());
        }
        None
    }

    // ── Invocation ───────────────────────────────────────────────────

    async fn invoke_with_retry(
        &self,
        registered: &RegisteredTool,
        tool: &ToolSpec,
        args: &Map<String, Value>,
        step_dir: &std::path::Path,
        step_index: usize,
    ) -> std::result::Result<ExecutionRecord, (ExecutionRecord, GenesisError)> {
        let mut attempt = 0u32;
        loop {
            self.events
                .send(Event::tool_start(&tool.name, step_index))
                .await;
            let started = Instant::now();
            let result = self
                .invoke_once(registered, tool, args, step_dir, step_index)
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(output_path) => {
                    let shown = output_path.to_string_lossy().into_owned();
                    self.events
                        .send(Event::tool_end(&tool.name, step_index, Some(&shown)))
                        .await;
                    return Ok(ExecutionRecord {
                        tool: tool.name.clone(),
                        args: Value::Object(args.clone()),
                        status: StepStatus::Ok,
                        mime: Some(mime_for(tool.output_type).into()),
                        output_path: Some(output_path),
                        stderr_tail: None,
                        duration_ms,
                    });
                }
                Err(StepFailure::Transient(message)) if attempt < TRANSIENT_RETRIES => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        tool = %tool.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transient tool failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    let (status, err) = match failure {
                        StepFailure::Timeout => (
                            StepStatus::TimedOut,
                            GenesisError::ToolTimeout {
                                tool: tool.name.clone(),
                                seconds: self.config.tool_timeout_s,
                            },
                        ),
                        StepFailure::Transient(message) | StepFailure::Crash(message) => (
                            StepStatus::Failed,
                            GenesisError::ToolCrash {
                                tool: tool.name.clone(),
                                stderr_tail: message,
                            },
                        ),
                        StepFailure::Invariant(reason) => (
                            StepStatus::Failed,
                            GenesisError::InvariantViolation { reason },
                        ),
                    };
                    let record = ExecutionRecord {
                        tool: tool.name.clone(),
                        args: Value::Object(args.clone()),
                        status,
                        output_path: None,
                        mime: None,
                        stderr_tail: match &err {
                            GenesisError::ToolCrash { stderr_tail, .. } => {
                                Some(stderr_tail.clone())
                            }
                            _ => None,
                        },
                        duration_ms,
                    };
                    self.events
                        .send(Event::tool_end(&tool.name, step_index, None))
                        .await;
                    return Err((record, err));
                }
            }
        }
    }

    async fn invoke_once(
        &self,
        registered: &RegisteredTool,
        tool: &ToolSpec,
        args: &Map<String, Value>,
        step_dir: &std::path::Path,
        step_index: usize,
    ) -> std::result::Result<PathBuf, StepFailure> {
        let (stdout_tx, mut stdout_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let invocation = ToolInvocation {
            args,
            workspace: step_dir,
            stdout: stdout_tx,
        };

        let timeout = Duration::from_secs(self.config.tool_timeout_s);
        let handler = registered.handler.clone();
        let handler_fut = async move {
            let result = tokio::time::timeout(timeout, handler.run(invocation)).await;
            // Dropping the invocation closed the stdout sender.
            result
        };
        let tail_fut = async {
            while let Some(line) = stdout_rx.recv().await {
                self.events
                    .send(Event::tool_stdout(&tool.name, step_index, &line))
                    .await;
            }
        };
        let (outcome, ()) = tokio::join!(handler_fut, tail_fut);

        let output = match outcome {
            Err(_) => return Err(StepFailure::Timeout),
            Ok(Err(ToolError::Transient(message))) => {
                return Err(StepFailure::Transient(message))
            }
            Ok(Err(other)) => return Err(StepFailure::Crash(other.to_string())),
            Ok(Ok(output)) => output,
        };

        match output {
            ToolOutput::File(path) => {
                if !path.exists() {
                    return Err(StepFailure::Crash(format!(
                        "handler reported missing output file {}",
                        path.display()
                    )));
                }
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase());
                let matches_declared = ext
                    .as_deref()
                    .is_some_and(|e| tool.output_type.accepted_extensions().contains(&e));
                if !matches_declared {
                    return Err(StepFailure::Invariant(format!(
                        "'{}' declares {} output but produced {}",
                        tool.name,
                        tool.output_type,
                        path.display()
                    )));
                }
                Ok(path)
            }
            ToolOutput::Value(value) => {
                // An in-memory value must fit the declared output type
                // before it is serialized: binary artifact types cannot
                // come back as values at all.
                let content = match tool.output_type {
                    WorkflowType::Json => serde_json::to_string_pretty(&value)
                        .map_err(|e| StepFailure::Crash(e.to_string()))?,
                    WorkflowType::Text | WorkflowType::TextFile | WorkflowType::Table => {
                        match value {
                            Value::String(s) => s,
                            other => {
                                return Err(StepFailure::Invariant(format!(
                                    "'{}' declares {} output but returned a {} value",
                                    tool.name,
                                    tool.output_type,
                                    json_kind(&other)
                                )))
                            }
                        }
                    }
                    other_ty => {
                        return Err(StepFailure::Invariant(format!(
                            "'{}' declares {} output but returned an in-memory value",
                            tool.name, other_ty
                        )))
                    }
                };
                let path = step_dir.join(format!("out.{}", tool.output_type.extension()));
                tokio::fs::write(&path, content)
                    .await
                    .map_err(|e| StepFailure::Transient(e.to_string()))?;
                Ok(path)
            }
        }
    }
}

enum BindResult {
    Bound(Map<String, Value>),
    Missing(Vec<String>),
}

enum StepFailure {
    Timeout,
    Transient(String),
    Crash(String),
    /// The produced artifact contradicts the tool's declared output
    /// type. Never retried.
    Invariant(String),
}

/// Human label for a JSON value's shape, for mismatch diagnostics.
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce a candidate value to a parameter kind; `None` if unusable.
fn coerce(kind: &ParamKind, value: &Value) -> Option<Value> {
    if kind.accepts(value) {
        return Some(value.clone());
    }
    match kind {
        // Anything scalar can be stringified for a string parameter.
        ParamKind::Str => match value {
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        ParamKind::Int => value
            .as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Value::from),
        ParamKind::Float => value
            .as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(Value::from),
        ParamKind::Bool => value.as_str().and_then(|s| match s.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        }),
        _ => None,
    }
}

fn clarification_text(tool: &ToolSpec, missing: &[String]) -> String {
    let fields: Vec<String> = missing
        .iter()
        .map(|name| match tool.param(name) {
            Some(p) if !p.description.is_empty() => format!("{name} ({})", p.description),
            _ => name.clone(),
        })
        .collect();
    format!(
        "To run {}, I still need: {}. What should I use?",
        tool.name,
        fields.join(", ")
    )
}

fn mime_for(ty: WorkflowType) -> &'static str {
    match ty {
        WorkflowType::Image => "image/png",
        WorkflowType::Audio => "audio/wav",
        WorkflowType::Video => "video/mp4",
        WorkflowType::Text | WorkflowType::TextFile => "text/plain",
        WorkflowType::Pdf => "application/pdf",
        WorkflowType::Table => "text/csv",
        WorkflowType::Json => "application/json",
        WorkflowType::None => "application/octet-stream",
    }
}

async fn read_capped(path: &std::path::Path) -> Option<String> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if meta.len() > MAX_INLINE_CONTENT {
        return None;
    }
    tokio::fs::read_to_string(path).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::FnHandler;
    use crate::registry::{RegistryBuilder, ToolHandler};
    use async_trait::async_trait;
    use genesis_llm::{ScriptStep, ScriptedProvider};
    use genesis_types::{PathCandidate, ToolParam};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn text_tool(name: &str, params: Vec<ToolParam>) -> ToolSpec {
        ToolSpec {
            name: name.into(),
            description: format!("{name} tool"),
            input_type: WorkflowType::Text,
            output_type: WorkflowType::Text,
            params,
            preferred: 0,
        }
    }

    struct Fixture {
        registry: ToolRegistry,
        config: GenesisConfig,
        provider: ScriptedProvider,
        cancel: CancellationToken,
    }

    impl Fixture {
        fn new(registry: ToolRegistry, script: Vec<ScriptStep>) -> Self {
            let mut config = GenesisConfig::default();
            config.tool_timeout_s = 2;
            Self {
                registry,
                config,
                provider: ScriptedProvider::new(script),
                cancel: CancellationToken::new(),
            }
        }

        async fn run(
            &self,
            state: &mut ConversationState,
            user_values: &Map<String, Value>,
            feedback: Option<&str>,
        ) -> (Result<ExecOutcome>, tempfile::TempDir) {
            let tmp = tempfile::tempdir().unwrap();
            let workspace = MessageWorkspace::create(
                tmp.path(),
                &state.conversation_id,
                &state.message_id,
            )
            .await
            .unwrap();
            let (events, mut stream) = EventSender::channel();
            let runtime = AgentRuntime {
                provider: &self.provider,
                events: &events,
                registry: &self.registry,
                llm_timeout: Duration::from_secs(5),
                dev_mode: false,
            };
            let executor = Executor {
                registry: &self.registry,
                config: &self.config,
                events: &events,
                agent_runtime: &runtime,
                cancel: &self.cancel,
            };
            let result = executor.run(state, &workspace, user_values, feedback).await;
            // Drain events so senders do not block in later assertions.
            while stream.try_recv().is_ok() {}
            (result, tmp)
        }
    }

    fn text_state(message: &str) -> ConversationState {
        let mut state = ConversationState::new("c1", "m1", message, vec![]);
        state.input_type = WorkflowType::Text;
        state
    }

    #[tokio::test]
    async fn runs_a_two_step_chain_binding_chain_content() {
        let mut builder = RegistryBuilder::new();
        let upper = text_tool(
            "upper",
            vec![ToolParam::required("text", ParamKind::Str, "input text")],
        );
        let exclaim = text_tool(
            "exclaim",
            vec![ToolParam::required("text", ParamKind::Str, "input text")],
        );
        builder
            .register(
                upper.clone(),
                Arc::new(FnHandler(|args: &Map<String, Value>| {
                    let text = args["text"].as_str().unwrap().to_uppercase();
                    Ok(ToolOutput::Value(Value::String(text)))
                })),
            )
            .unwrap();
        builder
            .register(
                exclaim.clone(),
                Arc::new(FnHandler(|args: &Map<String, Value>| {
                    Ok(ToolOutput::Value(Value::String(format!(
                        "{}!",
                        args["text"].as_str().unwrap()
                    ))))
                })),
            )
            .unwrap();
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("hello");
        state.chosen_path = Some(PathCandidate::new(vec![upper, exclaim]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        assert!(matches!(result.unwrap(), ExecOutcome::Completed));
        assert_eq!(state.execution_results.len(), 2);
        assert_eq!(
            state.type_savepoint,
            vec![WorkflowType::Text, WorkflowType::Text]
        );

        let final_path = state.execution_output_path.clone().unwrap();
        let content = tokio::fs::read_to_string(final_path).await.unwrap();
        assert_eq!(content, "HELLO!");
    }

    #[tokio::test]
    async fn missing_required_param_needs_input() {
        let mut builder = RegistryBuilder::new();
        let overlay = text_tool(
            "image_overlay",
            vec![
                ToolParam::required("text", ParamKind::Str, "source text"),
                ToolParam::required("caption_text", ParamKind::Str, "the caption to draw"),
            ],
        );
        builder
            .register(
                overlay.clone(),
                Arc::new(FnHandler(|_args: &Map<String, Value>| {
                    Ok(ToolOutput::Value(Value::Null))
                })),
            )
            .unwrap();
        // Binder proposes nothing.
        let fixture = Fixture::new(
            builder.build(),
            vec![ScriptStep::reply(r#"{"values": {}}"#)],
        );

        let mut state = text_state("add a caption");
        state.chosen_path = Some(PathCandidate::new(vec![overlay]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        match result.unwrap() {
            ExecOutcome::NeedsInput {
                missing,
                clarification,
            } => {
                assert_eq!(missing, vec!["caption_text"]);
                assert!(clarification.contains("caption_text"));
            }
            other => panic!("expected NeedsInput, got {other:?}"),
        }
        assert!(state.execution_results.is_empty());
    }

    #[tokio::test]
    async fn user_values_bind_before_binder() {
        let mut builder = RegistryBuilder::new();
        let overlay = text_tool(
            "overlay",
            vec![
                ToolParam::required("text", ParamKind::Str, "source text"),
                ToolParam::required("caption_text", ParamKind::Str, "caption"),
            ],
        );
        builder
            .register(
                overlay.clone(),
                Arc::new(FnHandler(|args: &Map<String, Value>| {
                    Ok(ToolOutput::Value(args["caption_text"].clone()))
                })),
            )
            .unwrap();
        // No binder script: with the user value present none is needed.
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("add a caption");
        state.chosen_path = Some(PathCandidate::new(vec![overlay]));
        let mut user_values = Map::new();
        user_values.insert("caption_text".into(), Value::String("Hello World".into()));

        let (result, _tmp) = fixture.run(&mut state, &user_values, None).await;
        assert!(matches!(result.unwrap(), ExecOutcome::Completed));
        let out = state.execution_output_path.clone().unwrap();
        assert_eq!(tokio::fs::read_to_string(out).await.unwrap(), "Hello World");
    }

    #[tokio::test]
    async fn defaults_fill_optional_params() {
        let mut builder = RegistryBuilder::new();
        let sized = text_tool(
            "sized",
            vec![
                ToolParam::required("text", ParamKind::Str, "input"),
                ToolParam::optional(
                    "font_size",
                    ParamKind::Int,
                    "point size",
                    Some(Value::from(24)),
                ),
            ],
        );
        builder
            .register(
                sized.clone(),
                Arc::new(FnHandler(|args: &Map<String, Value>| {
                    Ok(ToolOutput::Value(Value::String(format!(
                        "size={}",
                        args["font_size"]
                    ))))
                })),
            )
            .unwrap();
        // The binder is consulted for the unbound optional before the
        // default applies; it proposes nothing.
        let fixture = Fixture::new(
            builder.build(),
            vec![ScriptStep::reply(r#"{"values": {}}"#)],
        );

        let mut state = text_state("render it");
        state.chosen_path = Some(PathCandidate::new(vec![sized]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        assert!(matches!(result.unwrap(), ExecOutcome::Completed));
        let out = state.execution_output_path.clone().unwrap();
        assert_eq!(tokio::fs::read_to_string(out).await.unwrap(), "size=24");
    }

    #[tokio::test]
    async fn transient_failures_retried_then_succeed() {
        struct Flaky(AtomicU32);
        #[async_trait]
        impl ToolHandler for Flaky {
            async fn run(&self, _inv: ToolInvocation<'_>) -> std::result::Result<ToolOutput, ToolError> {
                if self.0.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ToolError::Transient("disk busy".into()))
                } else {
                    Ok(ToolOutput::Value(Value::String("ok".into())))
                }
            }
        }

        let mut builder = RegistryBuilder::new();
        let flaky = text_tool(
            "flaky",
            vec![ToolParam::required("text", ParamKind::Str, "input")],
        );
        builder
            .register(flaky.clone(), Arc::new(Flaky(AtomicU32::new(0))))
            .unwrap();
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("go");
        state.chosen_path = Some(PathCandidate::new(vec![flaky]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        assert!(matches!(result.unwrap(), ExecOutcome::Completed));
        assert_eq!(state.execution_results[0].status, StepStatus::Ok);
    }

    #[tokio::test]
    async fn deterministic_crash_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        struct Crashing(Arc<AtomicU32>);
        #[async_trait]
        impl ToolHandler for Crashing {
            async fn run(&self, _inv: ToolInvocation<'_>) -> std::result::Result<ToolOutput, ToolError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(ToolError::ExecutionFailed("segfault".into()))
            }
        }

        let mut builder = RegistryBuilder::new();
        let crasher = text_tool(
            "crasher",
            vec![ToolParam::required("text", ParamKind::Str, "input")],
        );
        builder
            .register(crasher.clone(), Arc::new(Crashing(calls.clone())))
            .unwrap();
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("go");
        state.chosen_path = Some(PathCandidate::new(vec![crasher]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        let err = result.unwrap_err();
        assert!(matches!(err, GenesisError::ToolCrash { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "crash must not be retried");
        assert_eq!(state.execution_results[0].status, StepStatus::Failed);
        assert!(state.execution_results[0]
            .stderr_tail
            .as_deref()
            .unwrap()
            .contains("segfault"));
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        struct Slow;
        #[async_trait]
        impl ToolHandler for Slow {
            async fn run(&self, _inv: ToolInvocation<'_>) -> std::result::Result<ToolOutput, ToolError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(ToolOutput::Value(Value::Null))
            }
        }

        let mut builder = RegistryBuilder::new();
        let slow = text_tool(
            "slow",
            vec![ToolParam::required("text", ParamKind::Str, "input")],
        );
        builder.register(slow.clone(), Arc::new(Slow)).unwrap();
        let mut fixture = Fixture::new(builder.build(), vec![]);
        fixture.config.tool_timeout_s = 1;

        let mut state = text_state("go");
        state.chosen_path = Some(PathCandidate::new(vec![slow]));

        let started = Instant::now();
        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        let err = result.unwrap_err();
        assert!(matches!(err, GenesisError::ToolTimeout { seconds: 1, .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(state.execution_results[0].status, StepStatus::TimedOut);
    }

    #[tokio::test]
    async fn wrong_output_extension_is_invariant_violation() {
        struct WrongFile;
        #[async_trait]
        impl ToolHandler for WrongFile {
            async fn run(&self, inv: ToolInvocation<'_>) -> std::result::Result<ToolOutput, ToolError> {
                // Declares IMAGE output but writes a text file.
                let path = inv.workspace.join("out.txt");
                tokio::fs::write(&path, "not an image")
                    .await
                    .map_err(|e| ToolError::Transient(e.to_string()))?;
                Ok(ToolOutput::File(path))
            }
        }

        let mut builder = RegistryBuilder::new();
        let renderer = ToolSpec {
            name: "renderer".into(),
            description: "renderer test tool".into(),
            input_type: WorkflowType::Text,
            output_type: WorkflowType::Image,
            params: vec![ToolParam::required("text", ParamKind::Str, "input")],
            preferred: 0,
        };
        builder.register(renderer.clone(), Arc::new(WrongFile)).unwrap();
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("draw it");
        state.chosen_path = Some(PathCandidate::new(vec![renderer]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        let err = result.unwrap_err();
        assert!(matches!(err, GenesisError::InvariantViolation { .. }));
        assert!(err.to_string().contains("declares image"));
        assert_eq!(state.execution_results[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn in_memory_value_for_binary_output_is_invariant_violation() {
        let mut builder = RegistryBuilder::new();
        let renderer = ToolSpec {
            name: "renderer".into(),
            description: "renderer test tool".into(),
            input_type: WorkflowType::Text,
            output_type: WorkflowType::Image,
            params: vec![ToolParam::required("text", ParamKind::Str, "input")],
            preferred: 0,
        };
        builder
            .register(
                renderer.clone(),
                Arc::new(FnHandler(|_args: &Map<String, Value>| {
                    Ok(ToolOutput::Value(Value::String("pixels?".into())))
                })),
            )
            .unwrap();
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("draw it");
        state.chosen_path = Some(PathCandidate::new(vec![renderer]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        assert!(matches!(
            result.unwrap_err(),
            GenesisError::InvariantViolation { .. }
        ));
    }

    #[tokio::test]
    async fn non_string_value_for_text_output_is_invariant_violation() {
        let mut builder = RegistryBuilder::new();
        let lister = text_tool(
            "lister",
            vec![ToolParam::required("text", ParamKind::Str, "input")],
        );
        builder
            .register(
                lister.clone(),
                Arc::new(FnHandler(|_args: &Map<String, Value>| {
                    Ok(ToolOutput::Value(serde_json::json!(["a", "b"])))
                })),
            )
            .unwrap();
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("list it");
        state.chosen_path = Some(PathCandidate::new(vec![lister]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        let err = result.unwrap_err();
        assert!(matches!(err, GenesisError::InvariantViolation { .. }));
        assert!(err.to_string().contains("array"));
    }

    #[tokio::test]
    async fn mismatched_first_step_is_invariant_violation() {
        let mut builder = RegistryBuilder::new();
        let tool = text_tool(
            "texty",
            vec![ToolParam::required("text", ParamKind::Str, "input")],
        );
        builder
            .register(
                tool.clone(),
                Arc::new(FnHandler(|_args: &Map<String, Value>| {
                    Ok(ToolOutput::Value(Value::Null))
                })),
            )
            .unwrap();
        let fixture = Fixture::new(builder.build(), vec![]);

        let mut state = text_state("go");
        state.input_type = WorkflowType::Image;
        state.chosen_path = Some(PathCandidate::new(vec![tool]));

        let (result, _tmp) = fixture.run(&mut state, &Map::new(), None).await;
        assert!(matches!(
            result.unwrap_err(),
            GenesisError::InvariantViolation { .. }
        ));
    }

    #[test]
    fn coerce_handles_string_numbers() {
        assert_eq!(
            coerce(&ParamKind::Int, &Value::String("42".into())),
            Some(Value::from(42))
        );
        assert_eq!(
            coerce(&ParamKind::Str, &Value::from(7)),
            Some(Value::String("7".into()))
        );
        assert_eq!(coerce(&ParamKind::Int, &Value::String("abc".into())), None);
    }
}
