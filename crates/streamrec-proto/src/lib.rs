//! # streamrec-proto
//!
//! Shared types and collaborator traits for streamrec.
//!
//! This crate provides:
//! - The [`LivenessOracle`], [`SegmentCapturer`] and [`Transcoder`] traits the
//!   session controller and consolidator are written against
//! - Outcome values those collaborators report ([`CaptureOutcome`],
//!   [`TranscodeError`])
//! - [`TerminationReason`], the single way a recording session ends

mod capture;
mod liveness;
mod termination;
mod transcode;

pub use capture::{CaptureOutcome, CaptureRequest, SegmentCapturer};
pub use liveness::LivenessOracle;
pub use termination::TerminationReason;
pub use transcode::{TranscodeError, Transcoder};
