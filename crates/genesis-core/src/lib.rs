//! Core engine for the Genesis workflow orchestrator.
//!
//! The pieces, bottom up:
//!
//! - [`registry`] — the read-only path/agent tool registry.
//! - [`planner`] — enumeration of tool chains through the type graph.
//! - [`embeddings`] / [`precedent`] — the objective-similarity cache
//!   that short-circuits planning.
//! - [`agents`] — LLM-backed Classifier, Router, Finalizer, and the
//!   executor's argument binder.
//! - [`executor`] — runs a chosen chain step by step under isolation
//!   and timeouts.
//! - [`orchestrator`] — the per-message state machine and the
//!   [`Genesis`](orchestrator::Genesis) entry surface.
//! - [`events`] — the ordered per-message event channel.

pub mod agents;
pub mod embeddings;
pub mod events;
pub mod executor;
pub mod json_repair;
pub mod orchestrator;
pub mod planner;
pub mod precedent;
pub mod registry;
pub mod state_store;
pub mod workspace;

pub use embeddings::{Embedder, SimHashEmbedder};
pub use events::{EventSender, EventStream};
pub use orchestrator::Genesis;
pub use planner::find_paths;
pub use precedent::{PrecedentMatch, PrecedentStore};
pub use registry::{
    AgentRegisteredTool, AgentToolHandler, RegisteredTool, RegistryBuilder, ToolError,
    ToolHandler, ToolInvocation, ToolOutput, ToolRegistry,
};
pub use state_store::StateStore;
pub use workspace::MessageWorkspace;

/// Install a `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info` (or `debug` in dev mode). Safe to call more than once; later
/// calls are ignored.
pub fn init_tracing(dev_mode: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if dev_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
