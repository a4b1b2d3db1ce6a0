//! Transcode (remux / concatenate) contract.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Why a transcode step did not succeed.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("{tool} not found. Is it installed and on your PATH?")]
    ToolUnavailable { tool: String },

    #[error("transcode failed (exit {}): {stderr}", exit_label(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("transcode timed out after {}s", .after.as_secs())]
    TimedOut { after: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Stream-copy repackaging of captured segments.
///
/// Both operations copy the audio/video payload unchanged into the target
/// container. An `Ok(())` only means the tool reported success; callers still
/// verify the destination themselves.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Remuxes a single segment into `dest`.
    async fn remux(&self, src: &Path, dest: &Path) -> Result<(), TranscodeError>;

    /// Concatenates `segments` in the given order into `dest`.
    async fn concat(&self, segments: &[PathBuf], dest: &Path) -> Result<(), TranscodeError>;
}
