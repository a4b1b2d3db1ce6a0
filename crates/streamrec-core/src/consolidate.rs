//! Post-processing: turn a session's segments into one artifact.
//!
//! The transcode writes to a staging file next to the final path, which is
//! renamed into place only after it has been verified to exist and be
//! non-empty. Segments are deleted only after that rename.

use std::path::{Path, PathBuf};

use streamrec_proto::{TranscodeError, Transcoder};
use tracing::{debug, error, info, warn};

use crate::session::Segment;

/// Result of consolidating a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consolidation {
    /// The final artifact was written and verified.
    Artifact(PathBuf),
    /// Several segments exist but merging is disabled. Points at the first.
    PartialKept(PathBuf),
    /// Nothing usable was produced. Any segments are still on disk.
    Nothing,
}

impl Consolidation {
    /// Path worth reporting to the operator, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Consolidation::Artifact(path) | Consolidation::PartialKept(path) => Some(path),
            Consolidation::Nothing => None,
        }
    }
}

/// Remuxes or concatenates segments through a [`Transcoder`].
pub struct Consolidator<'a> {
    transcoder: &'a dyn Transcoder,
}

impl<'a> Consolidator<'a> {
    pub fn new(transcoder: &'a dyn Transcoder) -> Self {
        Self { transcoder }
    }

    /// Produces the final artifact for `segments`.
    ///
    /// - no segments: [`Consolidation::Nothing`]
    /// - one segment: remux into the final container
    /// - several, `merge_enabled == false`: [`Consolidation::PartialKept`], no transcode
    /// - several, merging: concatenate in sequence order
    ///
    /// Sources are deleted only when `delete_on_success` is set and the
    /// artifact has been verified.
    pub async fn consolidate(
        &self,
        segments: &[Segment],
        final_path: &Path,
        merge_enabled: bool,
        delete_on_success: bool,
    ) -> Consolidation {
        let mut ordered: Vec<&Segment> = segments.iter().collect();
        ordered.sort_by_key(|segment| segment.index);

        let staging = staging_path(final_path);
        let result = match ordered.as_slice() {
            [] => {
                info!("No segments to process.");
                return Consolidation::Nothing;
            }
            [only] => {
                info!(
                    "Remuxing {} → {}",
                    display_name(&only.path),
                    display_name(final_path)
                );
                self.transcoder.remux(&only.path, &staging).await
            }
            [first, ..] if !merge_enabled => {
                info!(
                    "{} segments saved. Merge disabled, skipping.",
                    ordered.len()
                );
                return Consolidation::PartialKept(first.path.clone());
            }
            _ => {
                info!(
                    "Merging {} segments → {}",
                    ordered.len(),
                    display_name(final_path)
                );
                let inputs: Vec<PathBuf> = ordered.iter().map(|s| s.path.clone()).collect();
                self.transcoder.concat(&inputs, &staging).await
            }
        };

        match verify_and_publish(result, &staging, final_path) {
            Ok(bytes) => {
                info!(
                    "Final recording: {} ({:.1} MB)",
                    display_name(final_path),
                    bytes as f64 / (1024.0 * 1024.0)
                );
                if delete_on_success {
                    cleanup(&ordered);
                }
                Consolidation::Artifact(final_path.to_path_buf())
            }
            Err(reason) => {
                error!("{}", reason);
                discard(&staging);
                error!("Post-processing failed. Keeping original segment files.");
                Consolidation::Nothing
            }
        }
    }
}

/// Checks the transcode result and the staging file, then moves it into place.
/// Returns the artifact size.
fn verify_and_publish(
    result: Result<(), TranscodeError>,
    staging: &Path,
    final_path: &Path,
) -> Result<u64, String> {
    if let Err(e) = result {
        return Err(e.to_string());
    }

    let bytes = match std::fs::metadata(staging) {
        Ok(meta) if meta.len() > 0 => meta.len(),
        Ok(_) => return Err("transcode reported success but the output is empty".to_string()),
        Err(_) => return Err("transcode reported success but produced no output".to_string()),
    };

    std::fs::rename(staging, final_path).map_err(|e| {
        format!(
            "could not move {} into place: {}",
            staging.display(),
            e
        )
    })?;
    Ok(bytes)
}

/// Staging location for the transcode output: `{stem}.partial.{ext}` beside
/// the final path. The extension is kept so the transcoder picks the right
/// container.
pub fn staging_path(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match final_path.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    final_path.with_file_name(name)
}

fn discard(staging: &Path) {
    match std::fs::remove_file(staging) {
        Ok(()) => debug!("Removed incomplete output {}", staging.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove incomplete output {}: {}", staging.display(), e),
    }
}

fn cleanup(segments: &[&Segment]) {
    let mut removed = 0;
    for segment in segments {
        match std::fs::remove_file(&segment.path) {
            Ok(()) => {
                removed += 1;
                debug!("Deleted {}", display_name(&segment.path));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete {}: {}", segment.path.display(), e),
        }
    }
    info!("Cleaned up {} file(s).", removed);
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
