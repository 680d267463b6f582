//! Core types for the Genesis workflow orchestrator.
//!
//! This crate holds the data model shared by every other Genesis crate:
//! workflow types, tool metadata, path candidates, conversation state,
//! event envelopes, precedent records, configuration, and the top-level
//! error taxonomy. It deliberately has no async or I/O dependencies so
//! that boundary collaborators (HTTP surface, persistence, UI) can depend
//! on it without pulling in the runtime.

pub mod config;
pub mod error;
pub mod event;
pub mod path;
pub mod precedent;
pub mod state;
pub mod tool;
pub mod workflow;

pub use config::GenesisConfig;
pub use error::{GenesisError, Result};
pub use event::{Event, EventKind, MessageType};
pub use path::PathCandidate;
pub use precedent::PrecedentRecord;
pub use state::{Attachment, ConversationState, ExecutionRecord, Node, StepStatus};
pub use tool::{AgentToolSpec, ParamKind, ToolParam, ToolSpec};
pub use workflow::WorkflowType;
