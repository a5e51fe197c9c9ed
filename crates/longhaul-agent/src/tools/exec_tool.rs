//! Shell command execution in the project directory.
//!
//! The command runs under `sh -c` with a per-call timeout; on timeout the
//! child is killed. Output is classified by the configured
//! [`OutputClassifier`] to produce the summary and next-step suggestions.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harness::classifier::{self, OutputClassifier};
use harness::tool_schema::{RunCommandArgs, ToolName, ToolResult};
use tokio::process::Command;

use super::{truncate_chars, Tool, ToolContext, ToolError};

/// Execute a shell command within the project directory, subject to a timeout.
pub struct RunCommandTool {
    pub working_dir: PathBuf,
    classifier: Arc<dyn OutputClassifier>,
    output_limit: usize,
}

impl RunCommandTool {
    pub fn new(ctx: &ToolContext) -> Self {
        Self {
            working_dir: ctx.project_dir.clone(),
            classifier: Arc::clone(&ctx.classifier),
            output_limit: ctx.output_limit,
        }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    const NAME: ToolName = ToolName::RunCommand;
    type Args = RunCommandArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        let child = Command::new("sh")
            .args(["-c", &args.command])
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(Duration::from_secs(args.timeout), child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(ToolResult::failure(format!("Failed to run command: {e}"))
                    .with_suggestion("Check command syntax"));
            }
            Err(_) => {
                tracing::warn!(command = %args.command, timeout = args.timeout, "command timed out");
                return Ok(ToolResult::failure(format!(
                    "Command timed out after {}s: {}",
                    args.timeout, args.command
                ))
                .with_suggestions(["Try with a longer timeout", "Check if command is hanging"]));
            }
        };

        let success = output.status.success();
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let analysis = self.classifier.classify(&args.command, &stdout, &stderr);
        tracing::debug!(command = %args.command, exit_code, kind = ?analysis.kind, "command finished");

        let summary = classifier::summarize(success, &analysis);
        let suggestions = classifier::suggest_next_steps(success, &analysis);
        let analysis = serde_json::to_value(&analysis).map_err(std::io::Error::other)?;

        let result = if success {
            ToolResult::success(summary)
        } else {
            ToolResult::failure(summary)
        };
        Ok(result
            .with_data("exit_code", exit_code)
            .with_data("stdout", truncate_chars(&stdout, self.output_limit))
            .with_data("stderr", truncate_chars(&stderr, self.output_limit))
            .with_data("analysis", analysis)
            .with_suggestions(suggestions))
    }
}
