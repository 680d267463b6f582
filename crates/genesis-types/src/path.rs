//! Path candidates: ordered tool chains through the type graph.

use serde::{Deserialize, Serialize};

use crate::tool::ToolSpec;
use crate::workflow::WorkflowType;

/// An ordered sequence of path tools whose types compose.
///
/// Each candidate inlines the full metadata of every step so that the
/// Router can inspect parameter schemas without a registry round-trip,
/// and so that saved precedents remain self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCandidate {
    pub steps: Vec<ToolSpec>,
}

impl PathCandidate {
    /// Build a candidate from tool specs.
    pub fn new(steps: Vec<ToolSpec>) -> Self {
        Self { steps }
    }

    /// Number of tools in the chain.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The input type of the first tool, if any.
    pub fn input_type(&self) -> Option<WorkflowType> {
        self.steps.first().map(|t| t.input_type)
    }

    /// The output type of the last tool, if any.
    pub fn output_type(&self) -> Option<WorkflowType> {
        self.steps.last().map(|t| t.output_type)
    }

    /// Sum of the `preferred` scores of all steps.
    pub fn preference_score(&self) -> i32 {
        self.steps.iter().map(|t| t.preferred).sum()
    }

    /// Tool names joined with `" -> "`, for logs and prompts.
    pub fn display(&self) -> String {
        self.steps
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check that the chain composes: it starts at `input_type`,
    /// consecutive tools agree on their intermediate types, no type is
    /// produced twice, and the final type is in `satisfying` (when the
    /// set is non-empty).
    ///
    /// Two rules keep candidates acyclic while admitting in-place
    /// transforms: no tool appears twice, and each type-changing step
    /// must produce a type no earlier type-changing step produced.
    /// In-place steps (output type equals the step's own input type,
    /// like denoise or translate) do not move through type space and
    /// are exempt. The input type itself is not counted as produced, so
    /// a chain may return to it once (OCR-then-overlay back to an
    /// image).
    pub fn validate(
        &self,
        input_type: WorkflowType,
        satisfying: &[WorkflowType],
    ) -> std::result::Result<(), String> {
        let first = self
            .steps
            .first()
            .ok_or_else(|| "empty path".to_string())?;
        if first.input_type != input_type {
            return Err(format!(
                "path starts at {} but input is {}",
                first.input_type, input_type
            ));
        }

        for pair in self.steps.windows(2) {
            if pair[0].output_type != pair[1].input_type {
                return Err(format!(
                    "'{}' produces {} but '{}' consumes {}",
                    pair[0].name, pair[0].output_type, pair[1].name, pair[1].input_type
                ));
            }
        }
        let mut names: Vec<&str> = Vec::new();
        let mut produced: Vec<WorkflowType> = Vec::new();
        for step in &self.steps {
            if names.contains(&step.name.as_str()) {
                return Err(format!("tool '{}' used twice", step.name));
            }
            names.push(&step.name);
            if step.output_type == step.input_type {
                continue;
            }
            if produced.contains(&step.output_type) {
                return Err(format!(
                    "type {} revisited at '{}'",
                    step.output_type, step.name
                ));
            }
            produced.push(step.output_type);
        }

        if !satisfying.is_empty() {
            let last = self.steps.last().unwrap().output_type;
            if !satisfying.contains(&last) {
                return Err(format!("path ends at {last} which satisfies nothing"));
            }
        }
        Ok(())
    }
}
