//! `streamrec doctor`: checks the configuration and the external tools
//! before an unattended run.

use streamrec_adapters::{ToolStatus, detect_tool};
use streamrec_core::RecorderConfig;
use tracing::warn;

use crate::{ConfigSource, load_config_with_overrides};

/// Runs every check and prints a report. Returns the process exit code.
pub async fn execute(config_sources: &[ConfigSource]) -> i32 {
    let (config, verdict) = check_config(config_sources);

    let mut failures = 0;

    match verdict {
        Ok(()) => println!("  ok    config (channel '{}')", config.channel),
        Err(reason) => {
            println!("  FAIL  config: {}", reason);
            failures += 1;
        }
    }

    let streamlink = detect_tool(&config.streamlink_path, "--version").await;
    failures += report_tool(&streamlink, "required for recording");

    let ffmpeg = detect_tool(&config.ffmpeg_path, "-version").await;
    failures += report_tool(&ffmpeg, "required for merging segments");

    if failures == 0 {
        println!("All checks passed.");
        0
    } else {
        println!("{} check(s) failed.", failures);
        1
    }
}

/// Loads and validates the config.
///
/// A load failure is the config check's verdict; the tool checks then fall
/// back to the default program names.
fn check_config(config_sources: &[ConfigSource]) -> (RecorderConfig, Result<(), String>) {
    match load_config_with_overrides(config_sources) {
        Ok(config) => {
            let verdict = config.validate().map_err(|e| e.to_string());
            (config, verdict)
        }
        Err(e) => {
            warn!("Config could not be loaded, checking default tool paths");
            (RecorderConfig::default(), Err(format!("{:#}", e)))
        }
    }
}

fn report_tool(status: &ToolStatus, role: &str) -> u32 {
    if status.available {
        println!(
            "  ok    {}: {}",
            status.program,
            status.version.as_deref().unwrap_or("version unknown")
        );
        0
    } else {
        println!("  FAIL  {}: not runnable ({})", status.program, role);
        1
    }
}
