//! Session and segment bookkeeping.

use std::fmt;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use streamrec_proto::TerminationReason;

/// One accepted capture: a non-empty file produced by a single capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 1-based position among accepted segments.
    pub index: u32,
    pub path: PathBuf,
    pub bytes: u64,
}

impl Segment {
    /// Size in mebibytes, for log output.
    pub fn size_mb(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

/// The controller's position in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// A capture attempt is about to run (or running).
    Capturing,
    /// A capture attempt ended; deciding whether to wait for a reconnect.
    Evaluating,
    /// Waiting out the grace period for the stream to return.
    Reconnecting,
    /// The session is over.
    Terminated(TerminationReason),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Capturing => write!(f, "capturing"),
            SessionState::Evaluating => write!(f, "evaluating"),
            SessionState::Reconnecting => write!(f, "reconnecting"),
            SessionState::Terminated(reason) => write!(f, "terminated ({})", reason),
        }
    }
}

/// One channel's recording on one calendar day.
///
/// The segment list is append-only and the reconnect counter only ever goes
/// up. A session lives for a single run and is never persisted.
#[derive(Debug, Clone)]
pub struct Session {
    channel: String,
    date: String,
    output_dir: PathBuf,
    container: String,
    segments: Vec<Segment>,
    reconnects: u32,
}

impl Session {
    /// Creates a session dated today (local time).
    pub fn start(
        channel: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        container: impl Into<String>,
    ) -> Self {
        Self::for_date(channel, Local::now().date_naive(), output_dir, container)
    }

    /// Creates a session for an explicit date.
    pub fn for_date(
        channel: impl Into<String>,
        date: NaiveDate,
        output_dir: impl Into<PathBuf>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            date: date.format("%Y-%m-%d").to_string(),
            output_dir: output_dir.into(),
            container: container.into(),
            segments: Vec::new(),
            reconnects: 0,
        }
    }

    /// Session date as `YYYY-MM-DD`.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    /// `{channel}_{date}`, the prefix shared by every segment file.
    pub fn session_id(&self) -> String {
        format!("{}_{}", self.channel, self.date)
    }

    /// Index the next accepted segment will receive.
    pub fn next_index(&self) -> u32 {
        self.segments.len() as u32 + 1
    }

    /// Path for the next segment: `{channel}_{date}_partNN.ts`.
    ///
    /// Rejected attempts do not consume an index, so the same path is handed
    /// out again until a capture is accepted.
    pub fn next_segment_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_part{:02}.ts", self.session_id(), self.next_index()))
    }

    /// Path of the consolidated output: `{channel} - {date}.{ext}`.
    pub fn final_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{} - {}.{}", self.channel, self.date, self.container))
    }

    /// Appends an accepted capture and returns the new segment.
    pub fn accept(&mut self, path: PathBuf, bytes: u64) -> &Segment {
        let segment = Segment {
            index: self.next_index(),
            path,
            bytes,
        };
        self.segments.push(segment);
        &self.segments[self.segments.len() - 1]
    }

    /// Records a confirmed reconnect and returns the new count.
    pub fn record_reconnect(&mut self) -> u32 {
        self.reconnects += 1;
        self.reconnects
    }

    /// Consumes the session, returning its segments in capture order.
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}
