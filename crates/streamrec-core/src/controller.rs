//! Session lifecycle controller.
//!
//! Drives one recording session through its states:
//!
//! ```text
//! Capturing -> Evaluating -> Reconnecting -> Capturing ...
//!     |             |              |
//!     +-------------+--------------+--> Terminated
//! ```
//!
//! A session ends exactly once, for one of three reasons: the reconnect budget
//! is spent, the stream does not come back within the grace period, or the
//! capture tool is missing. Segments accepted before the end are kept whatever
//! the reason.

use std::time::Duration;

use streamrec_proto::{CaptureOutcome, CaptureRequest, LivenessOracle, SegmentCapturer, TerminationReason};
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::session::{Session, SessionState};
use crate::wait::wait_for_reconnect;

/// A finished session and why it finished.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session: Session,
    pub termination: TerminationReason,
}

/// Runs capture attempts back to back, waiting for reconnects in between.
pub struct SessionController<'a> {
    config: &'a RecorderConfig,
    oracle: &'a dyn LivenessOracle,
    capturer: &'a dyn SegmentCapturer,
}

impl<'a> SessionController<'a> {
    pub fn new(
        config: &'a RecorderConfig,
        oracle: &'a dyn LivenessOracle,
        capturer: &'a dyn SegmentCapturer,
    ) -> Self {
        Self {
            config,
            oracle,
            capturer,
        }
    }

    /// Runs the session to its terminal state.
    ///
    /// Always starts in [`SessionState::Capturing`]. The session is owned by
    /// the controller until the report is returned.
    pub async fn run(&self, mut session: Session) -> SessionReport {
        let mut state = SessionState::Capturing;

        loop {
            state = match state {
                SessionState::Capturing => self.capture(&mut session).await,
                SessionState::Evaluating => self.evaluate(&session),
                SessionState::Reconnecting => self.reconnect(&mut session).await,
                SessionState::Terminated(termination) => {
                    info!(
                        "Session complete: {} segment(s), {} reconnection(s).",
                        session.segments().len(),
                        session.reconnects()
                    );
                    return SessionReport {
                        session,
                        termination,
                    };
                }
            };
            debug!(state = %state, "Session state transition");
        }
    }

    async fn capture(&self, session: &mut Session) -> SessionState {
        let dest = session.next_segment_path();
        info!(
            "Recording segment {} → {}",
            session.next_index(),
            file_name(&dest)
        );

        let outcome = self
            .capturer
            .capture(CaptureRequest {
                channel: &self.config.channel,
                quality: &self.config.quality,
                dest: &dest,
                stream_timeout: Duration::from_secs(self.config.stream_timeout),
                extra_args: &self.config.streamlink_args,
            })
            .await;

        match outcome {
            CaptureOutcome::Produced { path, bytes } if bytes > 0 => {
                let segment = session.accept(path, bytes);
                info!(
                    "Segment saved: {} ({:.1} MB)",
                    file_name(&segment.path),
                    segment.size_mb()
                );
                SessionState::Evaluating
            }
            CaptureOutcome::Produced { .. } | CaptureOutcome::Empty => {
                warn!("Segment file is empty or missing, discarding.");
                SessionState::Evaluating
            }
            CaptureOutcome::ToolUnavailable { tool } => {
                warn!(tool = %tool, "Capture tool unavailable. Ending session.");
                SessionState::Terminated(TerminationReason::ToolUnavailable { tool })
            }
        }
    }

    fn evaluate(&self, session: &Session) -> SessionState {
        // Budget is checked before waiting, so a flapping channel cannot keep
        // an unattended recorder polling forever.
        if session.reconnects() >= self.config.max_reconnects {
            warn!(
                "Max reconnections ({}) reached. Ending session.",
                self.config.max_reconnects
            );
            return SessionState::Terminated(TerminationReason::ReconnectBudgetExhausted {
                reconnects: session.reconnects(),
            });
        }
        SessionState::Reconnecting
    }

    async fn reconnect(&self, session: &mut Session) -> SessionState {
        let came_back = wait_for_reconnect(
            self.oracle,
            &self.config.channel,
            &self.config.quality,
            Duration::from_secs(self.config.reconnect_grace_period),
            Duration::from_secs(self.config.reconnect_check_interval),
        )
        .await;

        if came_back {
            let attempt = session.record_reconnect();
            info!(
                "Reconnecting (attempt {}/{})...",
                attempt, self.config.max_reconnects
            );
            SessionState::Capturing
        } else {
            info!("Stream appears to have ended.");
            SessionState::Terminated(TerminationReason::StreamEnded)
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
