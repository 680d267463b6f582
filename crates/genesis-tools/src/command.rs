//! Command-backed path tools.
//!
//! Most heavyweight transformers (OCR engines, audio filters, PDF
//! extractors) ship as external binaries. [`CommandTool`] adapts one
//! binary invocation into a path tool handler: an argument template is
//! expanded against the bound parameters plus two built-ins, then the
//! process runs with the step workspace as its working directory, its
//! stdout tailed line by line onto the event stream.
//!
//! Template placeholders:
//! - `{param}` — the bound value of parameter `param`
//! - `{output}` — the declared output file inside the step workspace
//! - `{workspace}` — the step workspace directory

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use genesis_core::{ToolError, ToolHandler, ToolInvocation, ToolOutput};

/// How many trailing stderr lines survive into the error message.
const STDERR_TAIL_LINES: usize = 10;

/// A path tool backed by an external binary.
pub struct CommandTool {
    program: String,
    /// Argument template, one placeholder-bearing string per argv slot.
    args: Vec<String>,
    /// File name (relative to the step workspace) the command writes.
    output_file: String,
}

impl CommandTool {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        output_file: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            output_file: output_file.into(),
        }
    }

    fn expand(&self, inv: &ToolInvocation<'_>) -> Result<Vec<String>, ToolError> {
        let output = inv.workspace.join(&self.output_file);
        let mut expanded = Vec::with_capacity(self.args.len());
        for template in &self.args {
            let mut arg = template.clone();
            arg = arg.replace("{output}", &output.to_string_lossy());
            arg = arg.replace("{workspace}", &inv.workspace.to_string_lossy());
            // Parameter placeholders.
            while let Some(start) = arg.find('{') {
                let Some(len) = arg[start..].find('}') else {
                    break;
                };
                let name = arg[start + 1..start + len].to_string();
                let value = inv
                    .args
                    .get(&name)
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .ok_or_else(|| {
                        ToolError::InvalidArgs(format!("no value for placeholder '{{{name}}}'"))
                    })?;
                arg.replace_range(start..start + len + 1, &value);
            }
            expanded.push(arg);
        }
        Ok(expanded)
    }
}

#[async_trait]
impl ToolHandler for CommandTool {
    async fn run(&self, inv: ToolInvocation<'_>) -> Result<ToolOutput, ToolError> {
        let argv = self.expand(&inv)?;
        debug!(program = %self.program, ?argv, "spawning tool command");

        let mut child = tokio::process::Command::new(&self.program)
            .args(&argv)
            .current_dir(inv.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ToolError::ExecutionFailed(format!("binary '{}' not found", self.program))
                }
                _ => ToolError::Transient(e.to_string()),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::ExecutionFailed("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolError::ExecutionFailed("stderr not captured".into()))?;

        let stdout_task = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                inv.emit(line);
            }
        };
        let stderr_task = async {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        };
        let wait_task = child.wait();

        let (_, stderr_tail, status) = tokio::join!(stdout_task, stderr_task, wait_task);
        let status = status.map_err(|e| ToolError::Transient(e.to_string()))?;

        if !status.success() {
            return Err(ToolError::ExecutionFailed(format!(
                "'{}' exited with {}: {}",
                self.program,
                status,
                stderr_tail.join("\n")
            )));
        }

        let output = inv.workspace.join(&self.output_file);
        if !output.exists() {
            return Err(ToolError::ExecutionFailed(format!(
                "'{}' succeeded but wrote no {}",
                self.program, self.output_file
            )));
        }
        Ok(ToolOutput::File(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn invocation<'a>(
        args: &'a Map<String, Value>,
        workspace: &'a std::path::Path,
    ) -> (ToolInvocation<'a>, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (
            ToolInvocation {
                args,
                workspace,
                stdout: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn runs_a_command_and_collects_output_file() {
        let tmp = tempfile::tempdir().unwrap();
        // `sh -c` stands in for a transformer binary: echoes to stdout
        // and writes the output file.
        let tool = CommandTool::new(
            "sh",
            vec![
                "-c".into(),
                "echo processing {text}; printf '%s' {text} > {output}".into(),
            ],
            "out.txt",
        );

        let mut args = Map::new();
        args.insert("text".into(), "hello".into());
        let (inv, mut stdout) = invocation(&args, tmp.path());

        let output = tool.run(inv).await.unwrap();
        let ToolOutput::File(path) = output else {
            panic!("expected a file output");
        };
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");
        assert_eq!(stdout.recv().await.unwrap(), "processing hello");
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = CommandTool::new(
            "sh",
            vec!["-c".into(), "echo kaputt >&2; exit 3".into()],
            "out.txt",
        );
        let args = Map::new();
        let (inv, _stdout) = invocation(&args, tmp.path());

        let err = tool.run(inv).await.unwrap_err();
        let ToolError::ExecutionFailed(message) = err else {
            panic!("expected ExecutionFailed");
        };
        assert!(message.contains("kaputt"));
    }

    #[tokio::test]
    async fn missing_binary_is_deterministic_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = CommandTool::new("genesis-no-such-binary", vec![], "out.txt");
        let args = Map::new();
        let (inv, _stdout) = invocation(&args, tmp.path());
        assert!(matches!(
            tool.run(inv).await,
            Err(ToolError::ExecutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn unfilled_placeholder_is_invalid_args() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = CommandTool::new("sh", vec!["-c".into(), "echo {missing}".into()], "out.txt");
        let args = Map::new();
        let (inv, _stdout) = invocation(&args, tmp.path());
        assert!(matches!(tool.run(inv).await, Err(ToolError::InvalidArgs(_))));
    }

    #[tokio::test]
    async fn success_without_output_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = CommandTool::new("sh", vec!["-c".into(), "true".into()], "out.txt");
        let args = Map::new();
        let (inv, _stdout) = invocation(&args, tmp.path());
        let err = tool.run(inv).await.unwrap_err();
        assert!(err.to_string().contains("wrote no"));
    }
}
