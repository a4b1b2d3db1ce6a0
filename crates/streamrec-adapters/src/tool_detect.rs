//! Detection of the external tools streamrec drives.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// How long a `--version` call may take before the tool counts as broken.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of checking one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub program: String,
    pub available: bool,
    /// First line of the version output, when the tool ran.
    pub version: Option<String>,
}

/// Runs `<program> <version_flag>` and reports what happened.
pub async fn detect_tool(program: &str, version_flag: &str) -> ToolStatus {
    let run = Command::new(program)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(VERSION_TIMEOUT, run).await {
        Ok(Ok(output)) => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty());
            debug!(program, ?version, "Tool detected");
            ToolStatus {
                program: program.to_string(),
                available: true,
                version,
            }
        }
        Ok(Err(e)) => {
            debug!(program, error = %e, "Tool not available");
            ToolStatus {
                program: program.to_string(),
                available: false,
                version: None,
            }
        }
        Err(_) => {
            debug!(program, "Tool did not answer its version flag in time");
            ToolStatus {
                program: program.to_string(),
                available: false,
                version: None,
            }
        }
    }
}

/// Returns true if `program` can be started.
pub async fn is_tool_available(program: &str, version_flag: &str) -> bool {
    detect_tool(program, version_flag).await.available
}
