//! Scripted collaborators shared by the core's unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use streamrec_proto::{
    CaptureOutcome, CaptureRequest, LivenessOracle, SegmentCapturer, TranscodeError, Transcoder,
};
use tokio::time::Instant;

/// Oracle answering from a fixed script, then a fallback value.
pub struct ScriptedOracle {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    probes: Mutex<Vec<Instant>>,
}

impl ScriptedOracle {
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: false,
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn always() -> Self {
        Self {
            fallback: true,
            ..Self::new([])
        }
    }

    pub fn never() -> Self {
        Self::new([])
    }

    pub fn calls(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    /// Probe instants relative to `start`.
    pub fn probe_offsets(&self, start: Instant) -> Vec<Duration> {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(start))
            .collect()
    }
}

#[async_trait]
impl LivenessOracle for ScriptedOracle {
    async fn probe(&self, _channel: &str, _quality: &str) -> bool {
        self.probes.lock().unwrap().push(Instant::now());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// What a scripted capture attempt does.
#[derive(Debug, Clone, Copy)]
pub enum CaptureStep {
    /// Writes this many bytes to the destination.
    Write(u64),
    /// Leaves an empty file behind, which the capturer then removes.
    Empty,
    /// Reports the capture tool as missing.
    Unavailable,
}

/// Capturer that follows a script and records every destination it was given.
pub struct ScriptedCapturer {
    script: Mutex<VecDeque<CaptureStep>>,
    fallback: CaptureStep,
    requests: Mutex<Vec<PathBuf>>,
}

impl ScriptedCapturer {
    pub fn new(script: impl IntoIterator<Item = CaptureStep>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: CaptureStep::Empty,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Produces `bytes` on every attempt.
    pub fn always(bytes: u64) -> Self {
        Self {
            fallback: CaptureStep::Write(bytes),
            ..Self::new([])
        }
    }

    pub fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested_paths(&self) -> Vec<PathBuf> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentCapturer for ScriptedCapturer {
    async fn capture(&self, request: CaptureRequest<'_>) -> CaptureOutcome {
        self.requests.lock().unwrap().push(request.dest.to_path_buf());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match step {
            CaptureStep::Write(bytes) => {
                write_bytes(request.dest, bytes);
                CaptureOutcome::Produced {
                    path: request.dest.to_path_buf(),
                    bytes,
                }
            }
            CaptureStep::Empty => {
                std::fs::write(request.dest, b"").unwrap();
                std::fs::remove_file(request.dest).unwrap();
                CaptureOutcome::Empty
            }
            CaptureStep::Unavailable => CaptureOutcome::ToolUnavailable {
                tool: "streamlink".to_string(),
            },
        }
    }
}

/// How the fake transcoder behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeBehavior {
    /// Writes a non-empty destination and reports success.
    Succeed,
    /// Reports success but leaves a zero-byte destination.
    SucceedEmpty,
    /// Writes a partial destination, then reports failure.
    Fail,
    /// Reports the transcode tool as missing.
    Unavailable,
}

/// A recorded transcoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeCall {
    Remux { src: PathBuf, dest: PathBuf },
    Concat { inputs: Vec<PathBuf>, dest: PathBuf },
}

pub struct FakeTranscoder {
    behavior: TranscodeBehavior,
    calls: Mutex<Vec<TranscodeCall>>,
}

impl FakeTranscoder {
    pub fn new(behavior: TranscodeBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<TranscodeCall> {
        self.calls.lock().unwrap().clone()
    }

    fn finish(&self, dest: &Path) -> Result<(), TranscodeError> {
        match self.behavior {
            TranscodeBehavior::Succeed => {
                write_bytes(dest, 2048);
                Ok(())
            }
            TranscodeBehavior::SucceedEmpty => {
                std::fs::write(dest, b"").unwrap();
                Ok(())
            }
            TranscodeBehavior::Fail => {
                write_bytes(dest, 16);
                Err(TranscodeError::Failed {
                    code: Some(1),
                    stderr: "Invalid data found when processing input".to_string(),
                })
            }
            TranscodeBehavior::Unavailable => Err(TranscodeError::ToolUnavailable {
                tool: "ffmpeg".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn remux(&self, src: &Path, dest: &Path) -> Result<(), TranscodeError> {
        self.calls.lock().unwrap().push(TranscodeCall::Remux {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
        });
        self.finish(dest)
    }

    async fn concat(&self, segments: &[PathBuf], dest: &Path) -> Result<(), TranscodeError> {
        self.calls.lock().unwrap().push(TranscodeCall::Concat {
            inputs: segments.to_vec(),
            dest: dest.to_path_buf(),
        });
        self.finish(dest)
    }
}

pub fn write_bytes(path: &Path, bytes: u64) {
    std::fs::write(path, vec![0u8; bytes as usize]).unwrap();
}
