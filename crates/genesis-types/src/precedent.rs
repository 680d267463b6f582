//! Precedent records: saved (objective, path) pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::path::PathCandidate;
use crate::workflow::WorkflowType;

/// A stored precedent, retrievable by semantic similarity on the
/// objective. Write-once aside from explicit deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecedentRecord {
    pub uuid: Uuid,
    /// The LLM-distilled goal phrase this precedent was saved under.
    pub objective: String,
    /// Embedding of `objective`, computed at save time.
    pub embedding: Vec<f32>,
    pub input_type: WorkflowType,
    pub output_type: WorkflowType,
    /// The full path that satisfied the objective, inlined.
    pub path: PathCandidate,
    pub chat_id: String,
    pub created_at: DateTime<Utc>,
}

impl PrecedentRecord {
    /// Build a new record with a fresh UUID and the current time.
    pub fn new(
        objective: impl Into<String>,
        embedding: Vec<f32>,
        input_type: WorkflowType,
        output_type: WorkflowType,
        path: PathCandidate,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            objective: objective.into(),
            embedding,
            input_type,
            output_type,
            path,
            chat_id: chat_id.into(),
            created_at: Utc::now(),
        }
    }
}
