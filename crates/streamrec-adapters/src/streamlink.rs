//! Streamlink-backed liveness probe and segment capturer.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use streamrec_core::{RecorderConfig, stream_url};
use streamrec_proto::{CaptureOutcome, CaptureRequest, LivenessOracle, SegmentCapturer};
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::process::{forward_lines, tool_name};

/// Shape of `streamlink --json <url>` output. On failure streamlink prints an
/// object with only `error` set.
#[derive(Debug, Deserialize)]
struct StreamlinkJson {
    #[serde(default)]
    streams: HashMap<String, serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Decides liveness from `streamlink --json` output.
///
/// The channel counts as live when the requested quality (or any entry of a
/// comma-separated quality list) is offered, or when `best` is. Returns an
/// error message for output that is not a stream listing.
pub fn streams_satisfy(json: &[u8], quality: &str) -> Result<bool, String> {
    let parsed: StreamlinkJson =
        serde_json::from_slice(json).map_err(|e| format!("unreadable streamlink output: {}", e))?;

    if let Some(err) = parsed.error {
        return Err(err);
    }

    let wanted = quality
        .split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .any(|q| parsed.streams.contains_key(q));
    Ok(wanted || parsed.streams.contains_key("best"))
}

/// [`LivenessOracle`] that asks streamlink which streams a channel offers.
#[derive(Debug, Clone)]
pub struct StreamlinkProbe {
    program: String,
    url_template: String,
    timeout: Duration,
}

impl StreamlinkProbe {
    pub fn new(program: impl Into<String>, url_template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            url_template: url_template.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(
            &config.streamlink_path,
            &config.url_template,
            Duration::from_secs(config.probe_timeout),
        )
    }
}

#[async_trait]
impl LivenessOracle for StreamlinkProbe {
    async fn probe(&self, channel: &str, quality: &str) -> bool {
        let url = stream_url(&self.url_template, channel);
        let mut command = Command::new(&self.program);
        command
            .arg("--json")
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                debug!(url = %url, "Liveness probe timed out after {}s", self.timeout.as_secs());
                return false;
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "{} not found while checking stream status. Is it installed and on your PATH?",
                    tool_name(&self.program)
                );
                return false;
            }
            Ok(Err(e)) => {
                debug!("Unexpected error checking stream status: {}", e);
                return false;
            }
            Ok(Ok(output)) => output,
        };

        // A non-zero exit still carries a JSON error body worth logging.
        match streams_satisfy(&output.stdout, quality) {
            Ok(live) => live,
            Err(reason) => {
                if reason.contains("No plugin can handle URL") {
                    warn!("Streamlink does not recognise URL: {}", url);
                } else {
                    debug!("Stream not available: {}", reason);
                }
                false
            }
        }
    }
}

/// Classifies a finished capture purely from the filesystem.
///
/// A non-empty `dest` is a produced segment. Anything else is empty, and an
/// empty file is deleted so it cannot be mistaken for a segment later.
pub fn classify_capture(dest: &Path) -> CaptureOutcome {
    match std::fs::metadata(dest) {
        Ok(meta) if meta.len() > 0 => CaptureOutcome::Produced {
            path: dest.to_path_buf(),
            bytes: meta.len(),
        },
        Ok(_) => {
            if let Err(e) = std::fs::remove_file(dest) {
                warn!("Could not remove empty segment {}: {}", dest.display(), e);
            }
            CaptureOutcome::Empty
        }
        Err(_) => CaptureOutcome::Empty,
    }
}

/// [`SegmentCapturer`] running one streamlink process per attempt.
#[derive(Debug, Clone)]
pub struct StreamlinkCapturer {
    program: String,
    url_template: String,
}

impl StreamlinkCapturer {
    pub fn new(program: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            url_template: url_template.into(),
        }
    }

    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(&config.streamlink_path, &config.url_template)
    }

    /// Arguments for one capture run, in invocation order.
    pub fn capture_args(&self, request: &CaptureRequest<'_>) -> Vec<String> {
        let mut args = vec![
            stream_url(&self.url_template, request.channel),
            request.quality.to_string(),
            "--output".to_string(),
            request.dest.display().to_string(),
            "--stream-timeout".to_string(),
            request.stream_timeout.as_secs().to_string(),
            "--hls-live-restart".to_string(),
        ];
        args.extend(request.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl SegmentCapturer for StreamlinkCapturer {
    async fn capture(&self, request: CaptureRequest<'_>) -> CaptureOutcome {
        let tool = tool_name(&self.program);

        // Only bytes written by this attempt may count as a segment. A file
        // already at `dest` belongs to an earlier run and is left untouched.
        if let Ok(meta) = std::fs::metadata(request.dest)
            && meta.len() > 0
        {
            error!(
                "{} already exists ({} bytes) from an earlier run. Move it aside to record this session.",
                request.dest.display(),
                meta.len()
            );
            return CaptureOutcome::Empty;
        }

        let args = self.capture_args(&request);
        debug!("Command: {} {}", self.program, args.join(" "));

        let spawned = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!("{} not found. Is it installed and on your PATH?", tool);
                return CaptureOutcome::ToolUnavailable { tool };
            }
            Err(e) => {
                error!("Error running {}: {}", tool, e);
                return classify_capture(request.dest);
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, (), ()) = tokio::join!(
            child.wait(),
            forward_lines(stdout, &tool),
            forward_lines(stderr, &tool)
        );

        match status {
            Ok(status) if !status.success() => {
                debug!("{} exited with {}", tool, status);
            }
            Ok(_) => {}
            Err(e) => error!("Error waiting for {}: {}", tool, e),
        }

        classify_capture(request.dest)
    }
}
