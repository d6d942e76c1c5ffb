//! Bounded external tool runs (`pdftotext`, `git`).

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{SchoolCalError, SchoolCalResult};

/// Locate `tool` on PATH.
pub fn find_tool(tool: &str) -> SchoolCalResult<PathBuf> {
    which::which(tool).map_err(|_| SchoolCalError::ToolNotInstalled(tool.to_string()))
}

/// Run `tool` with `args`, killing it if it outlives `limit`.
/// A non-zero exit is returned as output, not as an error.
pub async fn run_tool(
    tool: &str,
    args: &[&str],
    cwd: Option<&Path>,
    limit: Duration,
) -> SchoolCalResult<Output> {
    let binary_path = find_tool(tool)?;

    let mut command = Command::new(&binary_path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(tool, ?args, "Running tool");
    let child = command.spawn().map_err(|e| {
        SchoolCalError::transport(tool, format!("Failed to spawn {}: {e}", binary_path.display()))
    })?;

    timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| SchoolCalError::Timeout(tool.to_string(), limit.as_secs()))?
        .map_err(SchoolCalError::from)
}

/// Everything the tool said, stdout then stderr.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}
