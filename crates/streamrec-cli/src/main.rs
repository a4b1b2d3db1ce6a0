//! # streamrec-cli
//!
//! Binary entry point for streamrec.
//!
//! Loads and layers configuration, sets up logging, then hands off to the
//! recorder pipeline in `streamrec-core` with the streamlink/ffmpeg adapters.

mod doctor;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use streamrec_adapters::{
    FfmpegTranscoder, StreamlinkCapturer, StreamlinkProbe, is_tool_available,
};
use streamrec_core::{
    Consolidation, OVERRIDABLE_FIELDS, Recorder, RecorderConfig, RecordingSummary, StartMode,
};
use streamrec_proto::TerminationReason;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

// Unix-specific process management for process group leadership
#[cfg(unix)]
mod process_management {
    use nix::unistd::{Pid, getpgrp, setpgid, tcgetpgrp};
    use std::io::{IsTerminal, stdin, stdout};
    use tracing::debug;

    /// Makes the recorder the leader of its own process group.
    ///
    /// The streamlink and ffmpeg children inherit the group, so a signal sent
    /// to the group by a supervisor stops the whole recording at once.
    pub fn setup_process_group() {
        let pid = Pid::this();
        let pgrp = getpgrp();
        if pgrp == pid {
            debug!("Already process group leader: PID {}", pid);
            return;
        }

        // Leaving the foreground group would detach us from Ctrl-C.
        if is_foreground_tty_group(pgrp) {
            debug!("Keeping foreground process group {}", pgrp);
            return;
        }

        if let Err(e) = setpgid(pid, pid)
            && e != nix::errno::Errno::EPERM
        {
            debug!("Could not set process group ({}), continuing anyway", e);
        }
        debug!("Process group initialized: PID {}", pid);
    }

    fn is_foreground_tty_group(current_pgrp: Pid) -> bool {
        if stdin().is_terminal()
            && let Ok(fg) = tcgetpgrp(stdin())
        {
            return fg == current_pgrp;
        }

        if stdout().is_terminal()
            && let Ok(fg) = tcgetpgrp(stdout())
        {
            return fg == current_pgrp;
        }

        false
    }
}

#[cfg(not(unix))]
mod process_management {
    /// No-op on non-Unix platforms.
    pub fn setup_process_group() {}
}

/// Default config file, looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "streamrec.yml";

/// Prefix marking a `-c` value as a single-field override.
const OVERRIDE_PREFIX: &str = "recorder.";

/// Source for configuration: a file path or a single-field override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Local YAML file
    File(PathBuf),
    /// Field override (e.g., "recorder.quality=720p")
    Override { key: String, value: String },
}

impl ConfigSource {
    /// Parse a config source string into its variant.
    ///
    /// `recorder.field=value` is an override; anything else is a file path.
    fn parse(s: &str) -> Self {
        // Only the prefix plus '=' counts, so paths containing '=' stay paths.
        if s.starts_with(OVERRIDE_PREFIX)
            && let Some((key, value)) = s.split_once('=')
        {
            return ConfigSource::Override {
                key: key.to_string(),
                value: value.to_string(),
            };
        }
        ConfigSource::File(PathBuf::from(s))
    }
}

/// Applies `recorder.field=value` overrides in the order given.
///
/// Unknown fields are warned about and skipped. A value that does not parse
/// for its field is an error.
pub(crate) fn apply_config_overrides(
    config: &mut RecorderConfig,
    sources: &[ConfigSource],
) -> Result<()> {
    for source in sources {
        if let ConfigSource::Override { key, value } = source {
            let field = key.strip_prefix(OVERRIDE_PREFIX).unwrap_or(key);
            let known = config
                .apply_override(field, value)
                .with_context(|| format!("Invalid override {}={}", key, value))?;
            if known {
                debug!("Override applied: {} = {}", field, value);
            } else {
                warn!(
                    "Unknown recorder field '{}'. Known fields: {}",
                    field,
                    OVERRIDABLE_FIELDS.join(", ")
                );
            }
        }
    }
    Ok(())
}

/// Loads configuration from file sources with override support.
///
/// Only the first file source is read. A missing file falls back to the
/// defaults; a file that exists but cannot be parsed is an error.
pub(crate) fn load_config_with_overrides(config_sources: &[ConfigSource]) -> Result<RecorderConfig> {
    let (primary_sources, overrides): (Vec<_>, Vec<_>) = config_sources
        .iter()
        .partition(|s| !matches!(s, ConfigSource::Override { .. }));

    let path = match primary_sources.first() {
        Some(ConfigSource::File(path)) => path.clone(),
        // Only overrides specified - fall back to the default file as base
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    let mut config = if path.exists() {
        RecorderConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?
    } else {
        warn!("Config file {:?} not found, using defaults", path);
        RecorderConfig::default()
    };

    let override_sources: Vec<_> = overrides.into_iter().cloned().collect();
    apply_config_overrides(&mut config, &override_sources)?;

    Ok(config)
}

/// streamrec - records a live channel unattended, then consolidates the
/// captured segments into one file
#[derive(Parser, Debug)]
#[command(
    name = "streamrec",
    version,
    about,
    disable_help_subcommand = true,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments for `record` when no subcommand is given
    #[command(flatten)]
    record: RecordArgs,

    /// Configuration source: file path or recorder.field=value override.
    /// Can be specified multiple times. Overrides are applied after the file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true, action = ArgAction::Append)]
    config: Vec<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wait for the channel, record it and consolidate (default if no subcommand given)
    Record(RecordArgs),

    /// Check that the configuration is valid and streamlink/ffmpeg are runnable
    Doctor,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the record subcommand.
///
/// Each flag, when given, replaces the value from the config sources.
#[derive(Args, Debug, Clone, Default)]
struct RecordArgs {
    /// Channel to record
    channel: Option<String>,

    /// Directory for segments and the final recording
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Stream quality passed to streamlink (e.g. best, 720p60,720p)
    #[arg(short, long)]
    quality: Option<String>,

    /// Keep segments as separate files instead of merging them
    #[arg(long)]
    no_merge: bool,

    /// Keep segment files after a successful merge
    #[arg(long)]
    keep_segments: bool,

    /// Probe once and exit if the channel is offline instead of waiting
    #[arg(long)]
    no_wait: bool,

    /// Maximum number of reconnect attempts after the stream drops
    #[arg(long, value_name = "N")]
    max_reconnects: Option<u32>,
}

impl RecordArgs {
    fn apply(&self, config: &mut RecorderConfig) {
        if let Some(channel) = &self.channel {
            config.channel.clone_from(channel);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(quality) = &self.quality {
            config.quality.clone_from(quality);
        }
        if self.no_merge {
            config.merge_segments = false;
        }
        if self.keep_segments {
            config.cleanup_segments = false;
        }
        if let Some(max) = self.max_reconnects {
            config.max_reconnects = max;
        }
    }

    fn start_mode(&self) -> StartMode {
        if self.no_wait {
            StartMode::NoWait
        } else {
            StartMode::WaitForLive
        }
    }
}

/// Arguments for the completions subcommand.
#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: clap_complete::Shell,

    /// Override the binary name used in the completion script.
    #[arg(long, default_value = "streamrec")]
    name: String,
}

fn completions_command(args: CompletionsArgs) -> Result<()> {
    use clap_complete::generate;

    let mut cli = Cli::command();
    generate(args.shell, &mut cli, args.name, &mut std::io::stdout());
    Ok(())
}

/// Resolves the full configuration for a recording: sources, then flags.
fn resolve_config(config_sources: &[ConfigSource], args: &RecordArgs) -> Result<RecorderConfig> {
    let mut config = load_config_with_overrides(config_sources)?;
    args.apply(&mut config);
    config.validate()?;
    config.ensure_output_dir()?;
    Ok(config)
}

async fn record_command(config_sources: &[ConfigSource], args: RecordArgs) -> Result<i32> {
    let config = match resolve_config(config_sources, &args) {
        Ok(config) => config,
        Err(e) => {
            error!("Config error: {:#}", e);
            return Ok(1);
        }
    };

    info!("{}", "=".repeat(50));
    info!("streamrec {}", env!("CARGO_PKG_VERSION"));
    info!("Channel: {}", config.channel);
    info!("Quality: {}", config.quality);
    info!("Output:  {}", config.output_dir.display());
    info!("{}", "=".repeat(50));

    if config.merge_segments && !is_tool_available(&config.ffmpeg_path, "-version").await {
        warn!(
            "{} is not runnable; segments will stay on disk unmerged",
            config.ffmpeg_path
        );
    }

    let probe = StreamlinkProbe::from_config(&config);
    let capturer = StreamlinkCapturer::from_config(&config);
    let transcoder = FfmpegTranscoder::from_config(&config);

    let summary = Recorder::new(&config, &probe, &capturer, &transcoder)
        .run(args.start_mode())
        .await;

    report_summary(&summary);
    Ok(summary.exit_code())
}

fn report_summary(summary: &RecordingSummary) {
    if !summary.went_live() {
        info!("Channel never went live. No recording produced.");
        return;
    }

    if let Some(reason) = &summary.termination {
        info!(
            "Session ended: {} ({} segment(s), {} reconnect(s))",
            reason,
            summary.segments.len(),
            summary.reconnects
        );
    }

    match &summary.consolidation {
        Consolidation::Artifact(path) => info!("Recording saved: {}", path.display()),
        Consolidation::PartialKept(path) => {
            info!("Segments kept unmerged, first at {}", path.display());
        }
        Consolidation::Nothing if !summary.segments.is_empty() => {
            warn!("Post-processing failed. Segments are still on disk.");
            for segment in &summary.segments {
                warn!("  {}", segment.path.display());
            }
        }
        Consolidation::Nothing => info!("No recording produced."),
    }

    if let Some(TerminationReason::ToolUnavailable { tool }) = &summary.termination {
        error!("{} is not available. Install it or set streamlink_path.", tool);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    process_management::setup_process_group();

    let config_sources: Vec<ConfigSource> =
        cli.config.iter().map(|s| ConfigSource::parse(s)).collect();

    let code = match cli.command {
        Some(Commands::Record(args)) => record_command(&config_sources, args).await?,
        None => record_command(&config_sources, cli.record).await?,
        Some(Commands::Doctor) => doctor::execute(&config_sources).await,
        Some(Commands::Completions(args)) => {
            completions_command(args)?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("streamrec.yml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_config_source_parse_file() {
        assert_eq!(
            ConfigSource::parse("configs/night.yml"),
            ConfigSource::File(PathBuf::from("configs/night.yml"))
        );
    }

    #[test]
    fn test_config_source_parse_override() {
        assert_eq!(
            ConfigSource::parse("recorder.quality=720p60,720p"),
            ConfigSource::Override {
                key: "recorder.quality".to_string(),
                value: "720p60,720p".to_string(),
            }
        );
    }

    #[test]
    fn test_config_source_path_with_equals_is_file() {
        assert_eq!(
            ConfigSource::parse("dir=x/streamrec.yml"),
            ConfigSource::File(PathBuf::from("dir=x/streamrec.yml"))
        );
    }

    #[test]
    fn test_config_source_override_value_keeps_later_equals() {
        let source = ConfigSource::parse("recorder.url_template=https://x.tv/?c={channel}&a=b");
        assert_eq!(
            source,
            ConfigSource::Override {
                key: "recorder.url_template".to_string(),
                value: "https://x.tv/?c={channel}&a=b".to_string(),
            }
        );
    }

    #[test]
    fn test_load_config_file_then_overrides() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "channel: somechannel\nquality: 480p\nmax_reconnects: 4\n");

        let config = load_config_with_overrides(&[
            ConfigSource::File(path),
            ConfigSource::parse("recorder.quality=720p"),
            ConfigSource::parse("recorder.not_a_field=1"),
        ])
        .unwrap();

        assert_eq!(config.channel, "somechannel");
        assert_eq!(config.quality, "720p");
        assert_eq!(config.max_reconnects, 4);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config =
            load_config_with_overrides(&[ConfigSource::File(dir.path().join("absent.yml"))])
                .unwrap();
        assert_eq!(config, RecorderConfig::default());
    }

    #[test]
    fn test_load_config_unparseable_override_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "channel: somechannel\n");
        let result = load_config_with_overrides(&[
            ConfigSource::File(path),
            ConfigSource::parse("recorder.max_reconnects=lots"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "channel: [unclosed\n");
        assert!(load_config_with_overrides(&[ConfigSource::File(path)]).is_err());
    }

    #[test]
    fn test_cli_bare_channel_records() {
        let cli = Cli::try_parse_from(["streamrec", "somechannel", "-q", "720p", "--no-wait"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.record.channel.as_deref(), Some("somechannel"));
        assert_eq!(cli.record.quality.as_deref(), Some("720p"));
        assert!(cli.record.no_wait);
        assert_eq!(cli.config, vec![DEFAULT_CONFIG_FILE.to_string()]);
    }

    #[test]
    fn test_cli_record_subcommand_with_global_config() {
        let cli = Cli::try_parse_from([
            "streamrec",
            "-c",
            "night.yml",
            "-c",
            "recorder.quality=480p",
            "record",
            "somechannel",
            "--max-reconnects",
            "3",
            "--keep-segments",
        ])
        .unwrap();

        assert_eq!(cli.config, vec!["night.yml", "recorder.quality=480p"]);
        match cli.command {
            Some(Commands::Record(args)) => {
                assert_eq!(args.channel.as_deref(), Some("somechannel"));
                assert_eq!(args.max_reconnects, Some(3));
                assert!(args.keep_segments);
                assert!(!args.no_merge);
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_doctor_and_completions() {
        let cli = Cli::try_parse_from(["streamrec", "-v", "doctor"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Doctor)));

        let cli = Cli::try_parse_from(["streamrec", "completions", "bash"]).unwrap();
        match cli.command {
            Some(Commands::Completions(args)) => assert_eq!(args.name, "streamrec"),
            other => panic!("expected completions, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_negative_max_reconnects() {
        assert!(Cli::try_parse_from(["streamrec", "somechannel", "--max-reconnects", "-1"]).is_err());
    }

    #[test]
    fn test_record_args_override_config() {
        let mut config = RecorderConfig::default();
        let args = RecordArgs {
            channel: Some("somechannel".to_string()),
            output_dir: Some(PathBuf::from("/tmp/rec")),
            quality: None,
            no_merge: true,
            keep_segments: true,
            no_wait: true,
            max_reconnects: Some(0),
        };

        args.apply(&mut config);

        assert_eq!(config.channel, "somechannel");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/rec"));
        assert_eq!(config.quality, "best");
        assert!(!config.merge_segments);
        assert!(!config.cleanup_segments);
        assert_eq!(config.max_reconnects, 0);
        assert_eq!(args.start_mode(), StartMode::NoWait);
    }

    #[test]
    fn test_resolve_config_flags_beat_file_and_create_output_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/recordings");
        let path = write_config(
            &dir,
            &format!("channel: filechannel\noutput_dir: {}\n", out.display()),
        );
        let args = RecordArgs {
            channel: Some("flagchannel".to_string()),
            ..RecordArgs::default()
        };

        let config = resolve_config(&[ConfigSource::File(path)], &args).unwrap();

        assert_eq!(config.channel, "flagchannel");
        assert!(out.is_dir());
    }

    #[test]
    fn test_resolve_config_rejects_placeholder_channel() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            &format!(
                "channel: channelname\noutput_dir: {}\n",
                dir.path().join("rec").display()
            ),
        );
        let err = resolve_config(&[ConfigSource::File(path)], &RecordArgs::default()).unwrap_err();
        assert!(err.to_string().contains("channel"));
        assert!(!dir.path().join("rec").exists());
    }

    #[tokio::test]
    async fn test_record_command_invalid_config_exits_one() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "channel: 'not a valid name'\n");
        let code = record_command(&[ConfigSource::File(path)], RecordArgs::default())
            .await
            .unwrap();
        assert_eq!(code, 1);
    }
}
