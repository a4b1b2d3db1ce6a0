//! FFmpeg-backed [`Transcoder`].

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use streamrec_core::RecorderConfig;
use streamrec_proto::{TranscodeError, Transcoder};
use tokio::process::Command;
use tracing::{debug, error};

use crate::process::tool_name;

/// Renders an ffmpeg concat-demuxer list, one `file '<path>'` line per input.
///
/// Paths are made absolute because the demuxer resolves relative entries
/// against the list file's own directory.
pub fn concat_list(segments: &[PathBuf]) -> std::io::Result<String> {
    let mut list = String::new();
    for segment in segments {
        let absolute = std::path::absolute(segment)?;
        let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    Ok(list)
}

/// Stream-copy remux and concat through an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(
            &config.ffmpeg_path,
            Duration::from_secs(config.transcode_timeout),
        )
    }

    /// Arguments for a single-file remux.
    pub fn remux_args(src: &Path, dest: &Path) -> Vec<String> {
        let mut args = leading_args();
        args.extend(["-i".to_string(), src.display().to_string()]);
        args.extend(output_args(dest));
        args
    }

    /// Arguments for concatenating the inputs listed in `list_file`.
    pub fn concat_args(list_file: &Path, dest: &Path) -> Vec<String> {
        let mut args = leading_args();
        args.extend([
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list_file.display().to_string(),
        ]);
        args.extend(output_args(dest));
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<(), TranscodeError> {
        let tool = tool_name(&self.program);
        debug!("Command: {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    error!("{} not found. Is ffmpeg installed and on your PATH?", tool);
                    TranscodeError::ToolUnavailable { tool: tool.clone() }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                error!("{} timed out after {}s.", tool, self.timeout.as_secs());
                TranscodeError::TimedOut {
                    after: self.timeout,
                }
            })??;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(
            "{} failed (exit {}): {}",
            tool,
            output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            stderr
        );
        Err(TranscodeError::Failed {
            code: output.status.code(),
            stderr,
        })
    }
}

fn leading_args() -> Vec<String> {
    ["-hide_banner", "-loglevel", "error", "-y"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn output_args(dest: &Path) -> Vec<String> {
    vec![
        "-c".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        dest.display().to_string(),
    ]
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn remux(&self, src: &Path, dest: &Path) -> Result<(), TranscodeError> {
        self.run(Self::remux_args(src, dest)).await
    }

    async fn concat(&self, segments: &[PathBuf], dest: &Path) -> Result<(), TranscodeError> {
        // The list file is removed when `list_file` drops, success or not.
        let mut list_file = tempfile::Builder::new()
            .prefix("streamrec-concat-")
            .suffix(".txt")
            .tempfile()?;
        list_file.write_all(concat_list(segments)?.as_bytes())?;
        list_file.flush()?;

        self.run(Self::concat_args(list_file.path(), dest)).await
    }
}
