//! End-to-end recording pipeline: wait for the broadcast, record the
//! session, consolidate.

use std::time::Duration;

use streamrec_proto::{LivenessOracle, SegmentCapturer, TerminationReason, Transcoder};
use tracing::info;

use crate::config::RecorderConfig;
use crate::consolidate::{Consolidation, Consolidator};
use crate::controller::SessionController;
use crate::session::{Segment, Session};
use crate::wait::wait_until_live;

/// How to treat a channel that is offline at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Poll until live, up to `initial_wait`.
    #[default]
    WaitForLive,
    /// Probe once and give up if offline.
    NoWait,
}

/// Everything the caller needs to report on a run.
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    /// `None` when the channel never went live and no session started.
    pub session_date: Option<String>,
    pub segments: Vec<Segment>,
    pub reconnects: u32,
    /// `None` when no session started.
    pub termination: Option<TerminationReason>,
    pub consolidation: Consolidation,
}

impl RecordingSummary {
    fn offline() -> Self {
        Self {
            session_date: None,
            segments: Vec::new(),
            reconnects: 0,
            termination: None,
            consolidation: Consolidation::Nothing,
        }
    }

    /// True if a session actually ran.
    pub fn went_live(&self) -> bool {
        self.termination.is_some()
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        self.termination
            .as_ref()
            .map_or(0, TerminationReason::exit_code)
    }
}

/// Wires the collaborators into a full run.
pub struct Recorder<'a> {
    config: &'a RecorderConfig,
    oracle: &'a dyn LivenessOracle,
    capturer: &'a dyn SegmentCapturer,
    transcoder: &'a dyn Transcoder,
}

impl<'a> Recorder<'a> {
    pub fn new(
        config: &'a RecorderConfig,
        oracle: &'a dyn LivenessOracle,
        capturer: &'a dyn SegmentCapturer,
        transcoder: &'a dyn Transcoder,
    ) -> Self {
        Self {
            config,
            oracle,
            capturer,
            transcoder,
        }
    }

    /// Waits for the channel (per `mode`), then records and consolidates a
    /// session dated today.
    pub async fn run(&self, mode: StartMode) -> RecordingSummary {
        if !self.await_start(mode).await {
            return RecordingSummary::offline();
        }

        let session = Session::start(
            &self.config.channel,
            &self.config.output_dir,
            &self.config.container,
        );
        self.record(session).await
    }

    /// Records and consolidates `session`, assuming the channel is live.
    pub async fn record(&self, session: Session) -> RecordingSummary {
        let report = SessionController::new(self.config, self.oracle, self.capturer)
            .run(session)
            .await;

        let final_path = report.session.final_path();
        let session_date = report.session.date().to_string();
        let reconnects = report.session.reconnects();
        let segments = report.session.into_segments();

        let consolidation = Consolidator::new(self.transcoder)
            .consolidate(
                &segments,
                &final_path,
                self.config.merge_segments,
                self.config.cleanup_segments,
            )
            .await;

        RecordingSummary {
            session_date: Some(session_date),
            segments,
            reconnects,
            termination: Some(report.termination),
            consolidation,
        }
    }

    async fn await_start(&self, mode: StartMode) -> bool {
        match mode {
            StartMode::NoWait => {
                let live = self
                    .oracle
                    .probe(&self.config.channel, &self.config.quality)
                    .await;
                if !live {
                    info!("Channel is offline and --no-wait is set. Exiting.");
                }
                live
            }
            StartMode::WaitForLive => {
                wait_until_live(
                    self.oracle,
                    &self.config.channel,
                    &self.config.quality,
                    Duration::from_secs(self.config.initial_wait),
                    Duration::from_secs(self.config.retry_interval),
                )
                .await
            }
        }
    }
}
