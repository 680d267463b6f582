//! Error types for the Genesis orchestrator.
//!
//! Provides [`GenesisError`] as the top-level error type. Variants are
//! grouped into user-surfaced, recoverable, and fatal categories to guide
//! callers on whether retrying is worthwhile.

use thiserror::Error;

use crate::workflow::WorkflowType;

/// Top-level error type for the Genesis orchestrator.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GenesisError {
    // ── Surfaced to the user ─────────────────────────────────────────

    /// A required tool parameter could not be bound from any source.
    /// The machine suspends and asks the user for the missing fields.
    #[error("missing user input for: {}", missing.join(", "))]
    UserInputMissing {
        /// Names of the parameters that remain unbound.
        missing: Vec<String>,
    },

    /// The planner exhausted the depth bound without reaching a
    /// satisfying output type.
    #[error("no tool path from {input_type} to any of {wanted:?}")]
    NoPathFound {
        /// The detected input type.
        input_type: WorkflowType,
        /// The output types that would have satisfied the request.
        wanted: Vec<WorkflowType>,
    },

    // ── Recoverable ──────────────────────────────────────────────────

    /// A tool handler exceeded its wall-clock budget.
    #[error("tool '{tool}' timed out after {seconds}s")]
    ToolTimeout {
        /// Name of the tool.
        tool: String,
        /// The budget that was exceeded.
        seconds: u64,
    },

    /// A tool handler failed at runtime.
    #[error("tool '{tool}' failed: {stderr_tail}")]
    ToolCrash {
        /// Name of the tool.
        tool: String,
        /// The last captured stderr lines.
        stderr_tail: String,
    },

    /// The LLM provider failed after retries were exhausted.
    #[error("llm unavailable: {message}")]
    LlmUnavailable {
        /// Provider-supplied failure description.
        message: String,
    },

    // ── Terminal ─────────────────────────────────────────────────────

    /// The client cancelled the in-flight message.
    #[error("cancelled")]
    Cancelled,

    /// An internal invariant was broken (e.g. type mismatch between
    /// consecutive steps). Always fatal.
    #[error("invariant violation: {reason}")]
    InvariantViolation {
        /// Diagnostic description of the broken invariant.
        reason: String,
    },

    /// Tool registration failed (duplicate name, invalid signature).
    #[error("registry error: {reason}")]
    Registry {
        /// What was wrong with the registration.
        reason: String,
    },

    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenesisError {
    /// Whether a local retry may succeed.
    ///
    /// Timeouts and crashes are retried by the executor (transient I/O and
    /// flaky binaries); everything else either surfaces to the user or is
    /// fatal for the message.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenesisError::ToolTimeout { .. }
                | GenesisError::ToolCrash { .. }
                | GenesisError::Io(_)
        )
    }
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GenesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_missing_display() {
        let err = GenesisError::UserInputMissing {
            missing: vec!["caption_text".into(), "font_size".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing user input for: caption_text, font_size"
        );
    }

    #[test]
    fn no_path_found_display_names_types() {
        let err = GenesisError::NoPathFound {
            input_type: WorkflowType::Image,
            wanted: vec![WorkflowType::Pdf],
        };
        assert!(err.to_string().contains("image"));
        assert!(err.to_string().contains("Pdf"));
    }

    #[test]
    fn transient_classification() {
        assert!(GenesisError::ToolTimeout {
            tool: "image_ocr".into(),
            seconds: 120,
        }
        .is_transient());
        assert!(!GenesisError::Cancelled.is_transient());
        assert!(!GenesisError::InvariantViolation {
            reason: "type mismatch".into(),
        }
        .is_transient());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GenesisError = io_err.into();
        assert!(matches!(err, GenesisError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
