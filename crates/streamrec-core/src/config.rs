//! Recorder configuration.
//!
//! Configuration is a plain typed struct. Values come from built-in defaults,
//! then an optional YAML file, then explicit overrides, and are validated once
//! before a session starts. Nothing here is global: the resolved value is
//! handed to the controller and its collaborators by reference.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Placeholder channel name shipped in sample configs.
const PLACEHOLDER_CHANNEL: &str = "channelname";

static CHANNEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{1,25}$").expect("channel name pattern is valid")
});

/// Fields that can be set through `recorder.<field>=<value>` overrides.
pub const OVERRIDABLE_FIELDS: &[&str] = &[
    "channel",
    "output_dir",
    "quality",
    "stream_timeout",
    "initial_wait",
    "retry_interval",
    "reconnect_grace_period",
    "reconnect_check_interval",
    "max_reconnects",
    "merge_segments",
    "cleanup_segments",
    "container",
    "ffmpeg_path",
    "streamlink_path",
    "transcode_timeout",
    "probe_timeout",
    "url_template",
    "streamlink_args",
];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Please set a valid 'channel' in your config.")]
    MissingChannel,

    #[error("invalid channel name '{0}': expected 1-25 letters, digits or underscores")]
    InvalidChannel(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Fully-resolved recorder settings. All durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Channel to record.
    pub channel: String,

    /// Directory receiving segments and the final artifact.
    pub output_dir: PathBuf,

    /// Quality selector handed to the capture tool (`best`, `720p60`, ...).
    pub quality: String,

    /// Seconds without data before the capture tool gives up on the stream.
    pub stream_timeout: u64,

    /// Maximum seconds to wait for the channel to go live.
    pub initial_wait: u64,

    /// Seconds between liveness checks while waiting for the start.
    pub retry_interval: u64,

    /// Seconds to wait for the stream to return after a drop.
    pub reconnect_grace_period: u64,

    /// Seconds between liveness checks during the grace period.
    pub reconnect_check_interval: u64,

    /// Reconnects allowed per session.
    pub max_reconnects: u32,

    /// Concatenate multiple segments into one artifact.
    pub merge_segments: bool,

    /// Delete segments once the final artifact is verified.
    pub cleanup_segments: bool,

    /// Final container extension, without the dot.
    pub container: String,

    pub ffmpeg_path: String,

    pub streamlink_path: String,

    /// Ceiling for any single transcode invocation.
    pub transcode_timeout: u64,

    /// Ceiling for a single liveness probe.
    pub probe_timeout: u64,

    /// Stream URL with a `{channel}` placeholder.
    pub url_template: String,

    /// Extra arguments passed through to every capture invocation.
    pub streamlink_args: Vec<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            output_dir: PathBuf::from("recordings"),
            quality: "best".to_string(),
            stream_timeout: 120,
            initial_wait: 7200,
            retry_interval: 30,
            reconnect_grace_period: 300,
            reconnect_check_interval: 15,
            max_reconnects: 10,
            merge_segments: true,
            cleanup_segments: true,
            container: "mp4".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            streamlink_path: "streamlink".to_string(),
            transcode_timeout: 3600,
            probe_timeout: 30,
            url_template: "https://twitch.tv/{channel}".to_string(),
            streamlink_args: vec![
                "--twitch-disable-ads".to_string(),
                "--twitch-disable-hosting".to_string(),
            ],
        }
    }
}

impl RecorderConfig {
    /// Loads configuration from a YAML file. Keys missing from the file keep
    /// their defaults and unknown keys are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Reading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parses YAML content. An empty document yields the defaults.
    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Sets a single field from its textual form.
    ///
    /// Returns `Ok(false)` when `field` is not a known field so the caller can
    /// decide how loudly to complain.
    pub fn apply_override(&mut self, field: &str, value: &str) -> Result<bool, ConfigError> {
        match field {
            "channel" => self.channel = value.to_string(),
            "output_dir" => self.output_dir = PathBuf::from(value),
            "quality" => self.quality = value.to_string(),
            "stream_timeout" => self.stream_timeout = parse_field(field, value)?,
            "initial_wait" => self.initial_wait = parse_field(field, value)?,
            "retry_interval" => self.retry_interval = parse_field(field, value)?,
            "reconnect_grace_period" => self.reconnect_grace_period = parse_field(field, value)?,
            "reconnect_check_interval" => {
                self.reconnect_check_interval = parse_field(field, value)?;
            }
            "max_reconnects" => self.max_reconnects = parse_field(field, value)?,
            "merge_segments" => self.merge_segments = parse_field(field, value)?,
            "cleanup_segments" => self.cleanup_segments = parse_field(field, value)?,
            "container" => self.container = value.to_string(),
            "ffmpeg_path" => self.ffmpeg_path = value.to_string(),
            "streamlink_path" => self.streamlink_path = value.to_string(),
            "transcode_timeout" => self.transcode_timeout = parse_field(field, value)?,
            "probe_timeout" => self.probe_timeout = parse_field(field, value)?,
            "url_template" => self.url_template = value.to_string(),
            "streamlink_args" => {
                self.streamlink_args = value.split_whitespace().map(str::to_string).collect();
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Checks the resolved values. Does not touch the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.is_empty() || self.channel == PLACEHOLDER_CHANNEL {
            return Err(ConfigError::MissingChannel);
        }
        if !CHANNEL_NAME.is_match(&self.channel) {
            return Err(ConfigError::InvalidChannel(self.channel.clone()));
        }
        if self.quality.trim().is_empty() {
            return Err(invalid("quality", "must not be empty"));
        }

        for (field, value) in [
            ("stream_timeout", self.stream_timeout),
            ("initial_wait", self.initial_wait),
            ("retry_interval", self.retry_interval),
            ("reconnect_grace_period", self.reconnect_grace_period),
            ("reconnect_check_interval", self.reconnect_check_interval),
            ("transcode_timeout", self.transcode_timeout),
            ("probe_timeout", self.probe_timeout),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        if self.container.is_empty() || self.container.starts_with('.') {
            return Err(invalid(
                "container",
                "expected an extension without a leading dot, e.g. 'mp4'",
            ));
        }
        if !self.url_template.contains("{channel}") {
            return Err(invalid("url_template", "must contain '{channel}'"));
        }
        if self.ffmpeg_path.trim().is_empty() {
            return Err(invalid("ffmpeg_path", "must not be empty"));
        }
        if self.streamlink_path.trim().is_empty() {
            return Err(invalid("streamlink_path", "must not be empty"));
        }
        Ok(())
    }

    /// Creates the output directory if it does not exist yet.
    pub fn ensure_output_dir(&self) -> Result<(), ConfigError> {
        if !self.output_dir.exists() {
            info!("Creating output directory: {}", self.output_dir.display());
            std::fs::create_dir_all(&self.output_dir).map_err(|source| ConfigError::OutputDir {
                path: self.output_dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// The stream URL for the configured channel.
    pub fn stream_url(&self) -> String {
        stream_url(&self.url_template, &self.channel)
    }
}

/// Expands a `{channel}` URL template.
pub fn stream_url(template: &str, channel: &str) -> String {
    template.replace("{channel}", channel)
}

fn parse_field<T>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| invalid(field, &e.to_string()))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
