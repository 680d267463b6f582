//! Tool registry and [`ToolHandler`] trait definition.
//!
//! Path tools self-describe with a [`ToolSpec`] and are paired with an
//! opaque handler at registration time. The registry is assembled once
//! at process start through a [`RegistryBuilder`] and is read-only
//! thereafter; the orchestrator, planner, and executor share it behind
//! an `Arc`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use genesis_types::{AgentToolSpec, GenesisError, ToolSpec, WorkflowType};

/// Error type for tool execution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The arguments provided to the tool are invalid.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The tool execution failed deterministically.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A transient failure (flaky I/O, busy resource) worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A file or resource the tool needs was not found.
    #[error("not found: {0}")]
    FileNotFound(String),

    /// A filesystem path escapes the step workspace.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Sink for a handler's stdout lines; the executor forwards each line
/// to the event stream for UI tailing.
pub type StdoutSink = tokio::sync::mpsc::UnboundedSender<String>;

/// Everything a handler needs for one invocation.
pub struct ToolInvocation<'a> {
    /// Bound arguments, keyed by parameter name.
    pub args: &'a Map<String, Value>,
    /// The step workspace directory; all outputs go here.
    pub workspace: &'a Path,
    /// Stdout line sink.
    pub stdout: StdoutSink,
}

impl ToolInvocation<'_> {
    /// Fetch a required string argument.
    pub fn str_arg(&self, name: &str) -> Result<&str, ToolError> {
        self.args
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs(format!("missing string argument '{name}'")))
    }

    /// Fetch an optional string argument.
    pub fn opt_str_arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(|v| v.as_str())
    }

    /// Emit a stdout line (ignored if the consumer is gone).
    pub fn emit(&self, line: impl Into<String>) {
        let _ = self.stdout.send(line.into());
    }
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A file written inside the step workspace.
    File(PathBuf),
    /// An in-memory value; the executor serializes it to a file of the
    /// tool's declared output type.
    Value(Value),
}

/// A path tool's executable side. Handlers are opaque to the planner
/// and Router; only the executor calls them.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(&self, inv: ToolInvocation<'_>) -> Result<ToolOutput, ToolError>;
}

/// An agent tool's executable side: invoked by the agent runtime when
/// the model requests it mid-reasoning. Takes the call's JSON arguments
/// and returns a JSON result that is fed back to the model.
#[async_trait]
pub trait AgentToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}

/// A registered path tool: metadata plus handler.
#[derive(Clone)]
pub struct RegisteredTool {
    pub spec: ToolSpec,
    pub handler: Arc<dyn ToolHandler>,
}

/// A registered agent tool: metadata plus handler.
#[derive(Clone)]
pub struct AgentRegisteredTool {
    pub spec: AgentToolSpec,
    pub handler: Arc<dyn AgentToolHandler>,
}

/// Builder for the process-wide registry. Registration happens once at
/// startup; `build()` freezes the result.
#[derive(Default)]
pub struct RegistryBuilder {
    tools: Vec<RegisteredTool>,
    agent_tools: Vec<AgentRegisteredTool>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("tools", &self.tools.len())
            .field("agent_tools", &self.agent_tools.len())
            .finish()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path tool.
    ///
    /// Rejects duplicate names and tools whose input or output type is
    /// the reserved boundary type, leaving the builder unchanged.
    pub fn register(
        &mut self,
        spec: ToolSpec,
        handler: Arc<dyn ToolHandler>,
    ) -> genesis_types::Result<&mut Self> {
        if spec.input_type == WorkflowType::None || spec.output_type == WorkflowType::None {
            return Err(GenesisError::Registry {
                reason: format!("tool '{}' uses the reserved NONE type", spec.name),
            });
        }
        if self.tools.iter().any(|t| t.spec.name == spec.name) {
            return Err(GenesisError::Registry {
                reason: format!("duplicate tool name '{}'", spec.name),
            });
        }
        debug!(tool = %spec.name, input = %spec.input_type, output = %spec.output_type, "registering path tool");
        self.tools.push(RegisteredTool { spec, handler });
        Ok(self)
    }

    /// Register an agent tool (callable during an agent's LLM loop,
    /// never a graph edge).
    pub fn register_agent_tool(
        &mut self,
        spec: AgentToolSpec,
        handler: Arc<dyn AgentToolHandler>,
    ) -> genesis_types::Result<&mut Self> {
        if self.agent_tools.iter().any(|t| t.spec.name == spec.name) {
            return Err(GenesisError::Registry {
                reason: format!("duplicate agent tool name '{}'", spec.name),
            });
        }
        debug!(tool = %spec.name, "registering agent tool");
        self.agent_tools.push(AgentRegisteredTool { spec, handler });
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> ToolRegistry {
        let mut by_name = HashMap::new();
        let mut by_input: HashMap<WorkflowType, Vec<usize>> = HashMap::new();
        let mut by_output: HashMap<WorkflowType, Vec<usize>> = HashMap::new();
        for (idx, tool) in self.tools.iter().enumerate() {
            by_name.insert(tool.spec.name.clone(), idx);
            by_input.entry(tool.spec.input_type).or_default().push(idx);
            by_output.entry(tool.spec.output_type).or_default().push(idx);
        }
        // Deterministic iteration: name order within each bucket.
        for bucket in by_input.values_mut().chain(by_output.values_mut()) {
            bucket.sort_by(|a, b| self.tools[*a].spec.name.cmp(&self.tools[*b].spec.name));
        }
        ToolRegistry {
            tools: self.tools,
            by_name,
            by_input,
            by_output,
            agent_tools: self.agent_tools,
        }
    }
}

/// The read-only tool registry.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
    by_input: HashMap<WorkflowType, Vec<usize>>,
    by_output: HashMap<WorkflowType, Vec<usize>>,
    agent_tools: Vec<AgentRegisteredTool>,
}

impl ToolRegistry {
    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&RegisteredTool> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All tools consuming the given type, in name order.
    pub fn tools_by_input_type(&self, ty: WorkflowType) -> Vec<&RegisteredTool> {
        self.by_input
            .get(&ty)
            .map(|idxs| idxs.iter().map(|&i| &self.tools[i]).collect())
            .unwrap_or_default()
    }

    /// All tools producing the given type, in name order.
    pub fn tools_by_output_type(&self, ty: WorkflowType) -> Vec<&RegisteredTool> {
        self.by_output
            .get(&ty)
            .map(|idxs| idxs.iter().map(|&i| &self.tools[i]).collect())
            .unwrap_or_default()
    }

    /// All registered path tools.
    pub fn all_tools(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter()
    }

    /// Number of registered path tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no path tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The agent tool set.
    pub fn agent_tools(&self) -> &[AgentRegisteredTool] {
        &self.agent_tools
    }

    /// Look up an agent tool by name.
    pub fn agent_tool(&self, name: &str) -> Option<&AgentRegisteredTool> {
        self.agent_tools.iter().find(|t| t.spec.name == name)
    }

    /// Agent tool schemas in function-calling form, for attachment to a
    /// chat request.
    pub fn agent_tool_schemas(&self) -> Vec<Value> {
        self.agent_tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.spec.name,
                        "description": t.spec.description,
                        "parameters": t.spec.parameters,
                    }
                })
            })
            .collect()
    }
}
