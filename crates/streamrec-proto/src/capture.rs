//! Segment capture contract.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

/// Everything one capture attempt needs.
#[derive(Debug, Clone, Copy)]
pub struct CaptureRequest<'a> {
    pub channel: &'a str,
    pub quality: &'a str,
    /// Destination file. Must not be reused across accepted segments.
    pub dest: &'a Path,
    /// Passed to the capture tool as its own stall timeout.
    pub stream_timeout: Duration,
    /// Extra pass-through arguments for the capture tool.
    pub extra_args: &'a [String],
}

/// How a single capture attempt ended, judged from the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The tool exited and left a non-empty file behind.
    Produced { path: PathBuf, bytes: u64 },
    /// The tool exited (or failed) without producing data. Any empty file has
    /// already been removed.
    Empty,
    /// The capture tool could not be started at all.
    ToolUnavailable { tool: String },
}

impl CaptureOutcome {
    /// Returns true if the attempt produced a usable segment.
    pub fn is_produced(&self) -> bool {
        matches!(self, CaptureOutcome::Produced { .. })
    }
}

/// Runs one blocking capture attempt.
///
/// The call returns only once the capture tool has exited. There is no timeout
/// beyond `stream_timeout`, which the tool enforces itself.
#[async_trait]
pub trait SegmentCapturer: Send + Sync {
    async fn capture(&self, request: CaptureRequest<'_>) -> CaptureOutcome;
}
