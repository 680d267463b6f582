//! Text path tools: save to and load from text files.
//!
//! These two tools form the TEXT <-> TEXT_FILE edges of the type graph.
//! Both confine themselves to the step workspace; `load_text` validates
//! that the requested file does not escape it unless it came from a
//! prior step or attachment (absolute paths produced by the executor).

use std::path::Path;

use async_trait::async_trait;

use genesis_core::{ToolError, ToolHandler, ToolInvocation, ToolOutput};
use genesis_types::{ParamKind, ToolParam, ToolSpec, WorkflowType};

/// Metadata for `save_text`.
pub fn save_text_spec() -> ToolSpec {
    ToolSpec {
        name: "save_text".into(),
        description: "Write text content to a .txt file artifact".into(),
        input_type: WorkflowType::Text,
        output_type: WorkflowType::TextFile,
        params: vec![
            ToolParam::required("text", ParamKind::Str, "The text content to save"),
            ToolParam::optional(
                "file_name",
                ParamKind::Str,
                "Name of the output file",
                Some("output.txt".into()),
            ),
        ],
        preferred: 0,
    }
}

/// Metadata for `load_text`.
pub fn load_text_spec() -> ToolSpec {
    ToolSpec {
        name: "load_text".into(),
        description: "Read a text file artifact into text".into(),
        input_type: WorkflowType::TextFile,
        output_type: WorkflowType::Text,
        params: vec![ToolParam::required(
            "file",
            ParamKind::File {
                file_type: WorkflowType::TextFile,
            },
            "The text file to read",
        )],
        preferred: 0,
    }
}

/// Handler for `save_text`.
pub struct SaveTextTool;

#[async_trait]
impl ToolHandler for SaveTextTool {
    async fn run(&self, inv: ToolInvocation<'_>) -> Result<ToolOutput, ToolError> {
        let text = inv.str_arg("text")?;
        let file_name = inv.opt_str_arg("file_name").unwrap_or("output.txt");
        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return Err(ToolError::InvalidPath(file_name.to_string()));
        }
        let path = inv.workspace.join(file_name);
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| ToolError::Transient(e.to_string()))?;
        inv.emit(format!("wrote {} bytes to {}", text.len(), path.display()));
        Ok(ToolOutput::File(path))
    }
}

/// Handler for `load_text`.
pub struct LoadTextTool;

#[async_trait]
impl ToolHandler for LoadTextTool {
    async fn run(&self, inv: ToolInvocation<'_>) -> Result<ToolOutput, ToolError> {
        let file = inv.str_arg("file")?;
        let path = Path::new(file);
        if !path.exists() {
            return Err(ToolError::FileNotFound(file.to_string()));
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        inv.emit(format!("read {} bytes", content.len()));
        Ok(ToolOutput::Value(content.into()))
    }
}
