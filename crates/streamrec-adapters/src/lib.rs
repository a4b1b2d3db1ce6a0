//! # streamrec-adapters
//!
//! Subprocess-backed collaborators for the streamrec core.
//!
//! This crate provides:
//! - [`StreamlinkProbe`]: liveness checks via `streamlink --json`
//! - [`StreamlinkCapturer`]: one capture attempt per streamlink run
//! - [`FfmpegTranscoder`]: stream-copy remux and concatenation
//!
//! ## Tool detection
//!
//! The `tool_detect` module checks whether the external binaries can be
//! started at all, for `streamrec doctor` and the ffmpeg check before recording.

mod ffmpeg;
mod process;
mod streamlink;
mod tool_detect;

pub use ffmpeg::{FfmpegTranscoder, concat_list};
pub use streamlink::{StreamlinkCapturer, StreamlinkProbe, classify_capture, streams_satisfy};
pub use tool_detect::{ToolStatus, detect_tool, is_tool_available};
