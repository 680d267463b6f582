//! Orchestrator configuration.
//!
//! [`GenesisConfig`] carries every recognized knob with serde defaults,
//! plus `from_env()` which overlays the documented environment variables
//! onto the defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GenesisError, Result};

/// Default minimum hybrid score for a precedent to bypass planning.
const DEFAULT_PRECEDENT_THRESHOLD: f32 = 0.75;

/// Default maximum candidate path length.
const DEFAULT_MAX_PATH_DEPTH: usize = 4;

/// Default cap on returned candidates.
const DEFAULT_MAX_PATHS: usize = 16;

/// Default per-node iteration budget per message.
const DEFAULT_ITER_BUDGET: u32 = 3;

const DEFAULT_TOOL_TIMEOUT_S: u64 = 120;
const DEFAULT_LLM_TIMEOUT_S: u64 = 60;
const DEFAULT_MESSAGE_TIMEOUT_S: u64 = 900;

/// All recognized configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Minimum hybrid score for a precedent hit to bypass the planner.
    #[serde(default = "default_precedent_threshold")]
    pub precedent_threshold: f32,

    /// Maximum candidate path length.
    #[serde(default = "default_max_path_depth")]
    pub max_path_depth: usize,

    /// Maximum number of candidates returned by the planner.
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,

    /// Iteration budget per node per message.
    #[serde(default = "default_iter_budget")]
    pub iter_budget_per_node: u32,

    /// Per-tool wall-clock timeout in seconds.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_s: u64,

    /// Per-LLM-call timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_s: u64,

    /// Per-message wall-clock timeout in seconds.
    #[serde(default = "default_message_timeout")]
    pub message_timeout_s: u64,

    /// Retain the per-message workspace tree after completion.
    #[serde(default)]
    pub keep_workspace: bool,

    /// Verbose reasoning streaming.
    #[serde(default)]
    pub dev_mode: bool,

    /// Root of the per-message workspace tree.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Optional JSONL file backing the precedent store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precedent_path: Option<PathBuf>,
}

fn default_precedent_threshold() -> f32 {
    DEFAULT_PRECEDENT_THRESHOLD
}

fn default_max_path_depth() -> usize {
    DEFAULT_MAX_PATH_DEPTH
}

fn default_max_paths() -> usize {
    DEFAULT_MAX_PATHS
}

fn default_iter_budget() -> u32 {
    DEFAULT_ITER_BUDGET
}

fn default_tool_timeout() -> u64 {
    DEFAULT_TOOL_TIMEOUT_S
}

fn default_llm_timeout() -> u64 {
    DEFAULT_LLM_TIMEOUT_S
}

fn default_message_timeout() -> u64 {
    DEFAULT_MESSAGE_TIMEOUT_S
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("genesis")
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            precedent_threshold: default_precedent_threshold(),
            max_path_depth: default_max_path_depth(),
            max_paths: default_max_paths(),
            iter_budget_per_node: default_iter_budget(),
            tool_timeout_s: default_tool_timeout(),
            llm_timeout_s: default_llm_timeout(),
            message_timeout_s: default_message_timeout(),
            keep_workspace: false,
            dev_mode: false,
            workspace_root: default_workspace_root(),
            precedent_path: None,
        }
    }
}

impl GenesisConfig {
    /// Defaults overlaid with the documented environment variables.
    ///
    /// Unset variables keep their defaults; a set-but-unparsable variable
    /// is a configuration error rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = read_env("PRECEDENT_THRESHOLD")? {
            cfg.precedent_threshold = parse_env("PRECEDENT_THRESHOLD", &v)?;
        }
        if let Some(v) = read_env("MAX_PATH_DEPTH")? {
            cfg.max_path_depth = parse_env("MAX_PATH_DEPTH", &v)?;
        }
        if let Some(v) = read_env("MAX_PATHS")? {
            cfg.max_paths = parse_env("MAX_PATHS", &v)?;
        }
        if let Some(v) = read_env("ITER_BUDGET_PER_NODE")? {
            cfg.iter_budget_per_node = parse_env("ITER_BUDGET_PER_NODE", &v)?;
        }
        if let Some(v) = read_env("TOOL_TIMEOUT_S")? {
            cfg.tool_timeout_s = parse_env("TOOL_TIMEOUT_S", &v)?;
        }
        if let Some(v) = read_env("LLM_TIMEOUT_S")? {
            cfg.llm_timeout_s = parse_env("LLM_TIMEOUT_S", &v)?;
        }
        if let Some(v) = read_env("MESSAGE_TIMEOUT_S")? {
            cfg.message_timeout_s = parse_env("MESSAGE_TIMEOUT_S", &v)?;
        }
        if let Some(v) = read_env("KEEP_WORKSPACE")? {
            cfg.keep_workspace = parse_bool("KEEP_WORKSPACE", &v)?;
        }
        if let Some(v) = read_env("DEV_MODE")? {
            cfg.dev_mode = parse_bool("DEV_MODE", &v)?;
        }
        if let Some(v) = read_env("GENESIS_WORKSPACE_ROOT")? {
            cfg.workspace_root = PathBuf::from(v);
        }
        if let Some(v) = read_env("GENESIS_PRECEDENT_PATH")? {
            cfg.precedent_path = Some(PathBuf::from(v));
        }
        Ok(cfg)
    }
}

fn read_env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(v) if v.is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(GenesisError::Config {
            reason: format!("{name}: {e}"),
        }),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| GenesisError::Config {
        reason: format!("{name}={value} is not a valid value"),
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GenesisError::Config {
            reason: format!("{name}={value} is not a boolean"),
        }),
    }
}
