//! # streamrec-core
//!
//! Core recording functionality for streamrec.
//!
//! This crate provides:
//! - Typed configuration with YAML loading, overrides and validation
//! - The polling primitive behind "wait until live" and "wait for reconnect"
//! - The session lifecycle controller
//! - Consolidation of captured segments into a single artifact
//! - The end-to-end [`Recorder`] pipeline tying those together

mod config;
mod consolidate;
mod controller;
mod recorder;
mod session;
#[cfg(test)]
mod test_support;
mod wait;

pub use config::{ConfigError, OVERRIDABLE_FIELDS, RecorderConfig, stream_url};
pub use consolidate::{Consolidation, Consolidator, staging_path};
pub use controller::{SessionController, SessionReport};
pub use recorder::{Recorder, RecordingSummary, StartMode};
pub use session::{Segment, Session, SessionState};
pub use wait::{PollSchedule, poll_until, wait_for_reconnect, wait_until_live};
