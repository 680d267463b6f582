//! Streaming event envelopes.
//!
//! Every observable step of a message's lifecycle is an [`Event`]:
//! node-transition deltas (`updates`), streamed LLM tokens (`messages`),
//! executor signals (`custom`), the terminal persistence marker
//! (`persisted`), and failures (`error`). Events are framed one JSON
//! object per line on the wire; within a message they are strictly
//! ordered and monotonically timestamped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::Node;

/// The five event channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Updates,
    Messages,
    Custom,
    Persisted,
    Error,
}

/// Whether a terminal message is a normal reply or a clarification
/// question the machine suspended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Response,
    Question,
}

/// One streamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }

    /// A node-transition event: the completed node's state delta plus
    /// where the machine goes next.
    pub fn updates(node: Node, delta: Value, next_node: Node) -> Self {
        Self::new(
            EventKind::Updates,
            json!({
                node.as_str(): delta,
                "next_node": next_node.as_str(),
            }),
        )
    }

    /// A streamed LLM chunk. The payload is `[chunk, metadata]` with
    /// `metadata.langgraph_node` naming the agent whose reasoning
    /// produced it (LangGraph-style streaming metadata, kept for client
    /// compatibility).
    pub fn message_chunk(node: Node, chunk: &str, reasoning: bool) -> Self {
        Self::new(
            EventKind::Messages,
            json!([
                chunk,
                {
                    "langgraph_node": node.as_str(),
                    "reasoning": reasoning,
                }
            ]),
        )
    }

    /// Executor signal: a tool started.
    pub fn tool_start(tool_name: &str, step_index: usize) -> Self {
        Self::new(
            EventKind::Custom,
            json!({
                "tool_name": tool_name,
                "status": "start",
                "step_index": step_index,
            }),
        )
    }

    /// Executor signal: a line of tool stdout, for UI tailing.
    pub fn tool_stdout(tool_name: &str, step_index: usize, line: &str) -> Self {
        Self::new(
            EventKind::Custom,
            json!({
                "tool_name": tool_name,
                "stdout": line,
                "step_index": step_index,
            }),
        )
    }

    /// Executor signal: a tool finished.
    pub fn tool_end(tool_name: &str, step_index: usize, output_path: Option<&str>) -> Self {
        Self::new(
            EventKind::Custom,
            json!({
                "tool_name": tool_name,
                "status": "end",
                "step_index": step_index,
                "output_path": output_path,
            }),
        )
    }

    /// Executor signal: path-discovery progress.
    pub fn path_progress(found: usize, depth: usize) -> Self {
        Self::new(
            EventKind::Custom,
            json!({
                "paths_found": found,
                "depth": depth,
            }),
        )
    }

    /// Agent thinking-time summary.
    pub fn think_duration(node: Node, think_duration_ns: u128) -> Self {
        Self::new(
            EventKind::Custom,
            json!({
                "node": node.as_str(),
                "think_duration_ns": think_duration_ns,
            }),
        )
    }

    /// Terminal envelope: the assistant message was persisted.
    pub fn persisted(assistant_message_id: &str, message_type: MessageType) -> Self {
        Self::new(
            EventKind::Persisted,
            json!({
                "assistant_message_id": assistant_message_id,
                "message_type": message_type,
            }),
        )
    }

    /// A failure surfaced to the consumer.
    pub fn error(message: &str, details: Option<&str>) -> Self {
        Self::new(
            EventKind::Error,
            json!({
                "message": message,
                "details": details,
            }),
        )
    }

    /// Serialize to one NDJSON line (no trailing newline).
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}
