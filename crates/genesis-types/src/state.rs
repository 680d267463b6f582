//! Per-message conversation state.
//!
//! A [`ConversationState`] is the record every orchestrator node reads
//! and writes. It is versioned: each checkpoint bumps `version`, and a
//! record with `is_complete=true` is immutable — re-processing the same
//! message clones it into a fresh version.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::PathCandidate;
use crate::workflow::WorkflowType;

/// An artifact attached to a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub path: PathBuf,
}

impl Attachment {
    /// The workflow type detected from this attachment's MIME type.
    pub fn workflow_type(&self) -> Option<WorkflowType> {
        WorkflowType::from_mime(&self.mime_type)
    }
}

/// The orchestrator nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Start,
    Classify,
    Precedent,
    FindPath,
    Route,
    Execute,
    Finalize,
    WaitingForFeedback,
    Complete,
    Error,
}

impl Node {
    /// Wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Node::Start => "start",
            Node::Classify => "classify",
            Node::Precedent => "precedent",
            Node::FindPath => "find_path",
            Node::Route => "route",
            Node::Execute => "execute",
            Node::Finalize => "finalize",
            Node::WaitingForFeedback => "waiting_for_feedback",
            Node::Complete => "complete",
            Node::Error => "error",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed,
    TimedOut,
}

/// Execution record for one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool: String,
    pub args: Value,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
    pub duration_ms: u64,
}

/// The full per-message state record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: String,
    pub message_id: String,
    /// Bumped on every checkpoint.
    pub version: u64,

    /// The user's message text.
    pub message: String,
    pub attachments: Vec<Attachment>,

    // ── Classifier outputs ───────────────────────────────────────────
    pub objective: String,
    pub input_type: WorkflowType,
    pub is_complex: bool,
    pub satisfying_output_types: Vec<WorkflowType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classify_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classify_clarification: Option<String>,

    // ── Planner / Router outputs ─────────────────────────────────────
    pub all_paths: Vec<PathCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_path: Option<PathCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_clarification: Option<String>,
    pub is_partial: bool,

    // ── Executor outputs ─────────────────────────────────────────────
    /// The running list of types actually produced along the chosen path.
    pub type_savepoint: Vec<WorkflowType>,
    pub execution_results: Vec<ExecutionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_output_path: Option<PathBuf>,

    // ── Finalizer outputs ────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalize_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    // ── Machine position ─────────────────────────────────────────────
    pub node: Node,
    pub next_node: Node,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Fresh state for a new user message.
    pub fn new(
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        message: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            version: 0,
            message: message.into(),
            attachments,
            objective: String::new(),
            input_type: WorkflowType::None,
            is_complex: false,
            satisfying_output_types: Vec::new(),
            classify_reasoning: None,
            classify_clarification: None,
            all_paths: Vec::new(),
            chosen_path: None,
            route_reasoning: None,
            route_clarification: None,
            is_partial: false,
            type_savepoint: Vec::new(),
            execution_results: Vec::new(),
            execution_output_path: None,
            response: None,
            finalize_reasoning: None,
            summary: None,
            node: Node::Start,
            next_node: Node::Classify,
            is_complete: false,
            error_details: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the version and touch `updated_at`. Called at each checkpoint.
    pub fn bump(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Seal the record. After this call the state is immutable by
    /// convention; re-processing must clone into a new version.
    pub fn seal(&mut self, node: Node, error_details: Option<String>) {
        self.node = node;
        self.next_node = node;
        self.is_complete = true;
        self.error_details = error_details;
        self.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_at_classify() {
        let state = ConversationState::new("c1", "m1", "hello", vec![]);
        assert_eq!(state.node, Node::Start);
        assert_eq!(state.next_node, Node::Classify);
        assert_eq!(state.version, 0);
        assert!(!state.is_complete);
    }

    #[test]
    fn bump_increments_version_and_touches_timestamp() {
        let mut state = ConversationState::new("c1", "m1", "hi", vec![]);
        let before = state.updated_at;
        state.bump();
        assert_eq!(state.version, 1);
        assert!(state.updated_at >= before);
    }

    #[test]
    fn seal_marks_complete() {
        let mut state = ConversationState::new("c1", "m1", "hi", vec![]);
        state.seal(Node::Error, Some("cancelled".into()));
        assert!(state.is_complete);
        assert_eq!(state.node, Node::Error);
        assert_eq!(state.error_details.as_deref(), Some("cancelled"));
        assert_eq!(state.version, 1);
    }

    #[test]
    fn attachment_detects_workflow_type() {
        let att = Attachment {
            file_name: "jp_sign.png".into(),
            mime_type: "image/png".into(),
            path: PathBuf::from("/tmp/jp_sign.png"),
        };
        assert_eq!(att.workflow_type(), Some(WorkflowType::Image));
    }

    #[test]
    fn node_wire_names() {
        assert_eq!(Node::FindPath.as_str(), "find_path");
        assert_eq!(
            serde_json::to_string(&Node::WaitingForFeedback).unwrap(),
            "\"waiting_for_feedback\""
        );
    }

    #[test]
    fn state_roundtrips_through_serde() {
        let state = ConversationState::new("c1", "m1", "hello", vec![]);
        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
