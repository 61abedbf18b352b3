// Shell command tool
//
// Runs a command through the platform shell with a per-call timeout.
// Read-only commands run directly; everything else asks the user first.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::command_safety::{CommandClass, CommandSafety};
use super::tool::{Tool, ToolArguments, ToolContext, ToolError, ToolParameters, aborted};

/// Default per-command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound accepted from the model.
pub const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct ShellArgs {
    command: String,
    #[serde(default)]
    timeout: Option<f64>,
    #[serde(default)]
    working_dir: Option<String>,
}

/// Executes shell commands.
#[derive(Debug, Default)]
pub struct ShellTool {
    safety: CommandSafety,
}

impl ShellTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn timeout_secs(requested: Option<f64>) -> u64 {
        match requested {
            Some(t) if t.is_finite() && t >= 1.0 => (t as u64).min(MAX_TIMEOUT_SECS),
            _ => DEFAULT_TIMEOUT_SECS,
        }
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its exit code and output. \
         Read-only commands run immediately; other commands need the user's approval."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("command", "string", "The shell command to execute", true)
            .add_property(
                "timeout",
                "integer",
                "Timeout in seconds (default 30, maximum 300)",
                false,
            )
            .add_property(
                "working_dir",
                "string",
                "Directory to run the command in, relative to the project root",
                false,
            )
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: ShellArgs = args.parse()?;
        let command = args.command.trim();
        if command.is_empty() {
            return Err(ToolError::invalid(self.name(), "command cannot be empty"));
        }

        match self.safety.classify(command) {
            CommandClass::Blocked { reason } => {
                warn!(command = %command, reason = %reason, "Blocked shell command");
                return Err(ToolError::Execution(format!("command blocked: {reason}")));
            }
            CommandClass::Confirm { dangerous } => {
                if !ctx.confirm("Execute command", command, dangerous).await {
                    return Ok(aborted("User aborted command execution"));
                }
            }
            CommandClass::ReadOnly => {}
        }

        let timeout_secs = Self::timeout_secs(args.timeout);
        let cwd = args
            .working_dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map_or_else(|| ctx.working_dir().to_path_buf(), |d| ctx.resolve_path(d));

        debug!(command = %command, cwd = %cwd.display(), timeout_secs, "Running shell command");

        let mut cmd = Self::shell_command(command);
        cmd.current_dir(&cwd);
        let child = cmd
            .spawn()
            .map_err(|e| ToolError::Execution(format!("Failed to execute command '{command}': {e}")))?;

        let outcome = tokio::select! {
            () = ctx.cancellation().cancelled() => return Err(ToolError::Cancelled),
            res = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()) => res,
        };

        let mut result = json!({
            "command": command,
            "working_dir": cwd.display().to_string(),
            "timeout": timeout_secs,
        });

        match outcome {
            Err(_) => {
                result["success"] = json!(false);
                result["timed_out"] = json!(true);
                result["output"] = json!("");
                result["error"] = json!(format!("command timed out after {timeout_secs} seconds"));
            }
            Ok(Err(e)) => {
                return Err(ToolError::Execution(format!("Failed to execute command '{command}': {e}")));
            }
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut combined = stdout.into_owned();
                if !stderr.is_empty() {
                    if !combined.is_empty() && !combined.ends_with('\n') {
                        combined.push('\n');
                    }
                    combined.push_str(&stderr);
                }
                result["output"] = json!(combined);
                result["exit_code"] = json!(output.status.code().unwrap_or(-1));
                result["success"] = json!(output.status.success());
                result["timed_out"] = json!(false);
            }
        }

        Ok(result)
    }
}
