//! Configuration system for the `GuestChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/guestchat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use guestchat_proto::api::DEFAULT_PAGE_LIMIT;

use crate::api::http::DEFAULT_USER_AGENT;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    chat: ChatFileConfig,
    storage: StorageFileConfig,
    sound: SoundFileConfig,
    ui: UiFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    poll_interval_secs: Option<u64>,
    notice_ttl_secs: Option<u64>,
    page_limit: Option<u32>,
    event_buffer: Option<usize>,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    state_file: Option<PathBuf>,
}

/// `[sound]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SoundFileConfig {
    command: Option<String>,
    file: Option<PathBuf>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Widget configuration (used by [`GuestChat`](crate::chat::GuestChat)).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Delay between polls.
    pub poll_interval: Duration,
    /// How long a transient notice stays visible.
    pub notice_ttl: Duration,
    /// Messages per page for the initial load and history pages.
    pub page_limit: u32,
    /// Capacity of the [`ChatEvent`](crate::chat::ChatEvent) channel.
    pub event_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            notice_ttl: Duration::from_secs(5),
            page_limit: DEFAULT_PAGE_LIMIT,
            event_buffer: 64,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Server --
    /// Backend base URL.
    pub base_url: String,
    /// Timeout applied to every backend request.
    pub request_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,

    // -- Chat --
    /// Widget configuration.
    pub chat: ChatConfig,

    // -- Storage --
    /// Override for the client state file. `None` uses the data directory.
    pub state_file: Option<PathBuf>,

    // -- Sound --
    /// External player command. `None` uses the terminal bell.
    pub sound_command: Option<String>,
    /// Audio file passed to the player command.
    pub sound_file: Option<PathBuf>,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            request_timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chat: ChatConfig::default(),
            state_file: None,
            sound_command: None,
            sound_file: None,
            poll_timeout: Duration::from_millis(50),
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path
    /// (`~/.config/guestchat/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            base_url: cli
                .base_url
                .clone()
                .or_else(|| file.server.base_url.clone())
                .unwrap_or(defaults.base_url),
            request_timeout: file
                .server
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            user_agent: file
                .server
                .user_agent
                .clone()
                .unwrap_or(defaults.user_agent),
            chat: ChatConfig {
                poll_interval: cli
                    .poll_interval_secs
                    .or(file.chat.poll_interval_secs)
                    .map_or(defaults.chat.poll_interval, Duration::from_secs),
                notice_ttl: file
                    .chat
                    .notice_ttl_secs
                    .map_or(defaults.chat.notice_ttl, Duration::from_secs),
                page_limit: file
                    .chat
                    .page_limit
                    .filter(|&l| l > 0)
                    .unwrap_or(defaults.chat.page_limit),
                event_buffer: file
                    .chat
                    .event_buffer
                    .filter(|&b| b > 0)
                    .unwrap_or(defaults.chat.event_buffer),
            },
            state_file: cli
                .state_file
                .clone()
                .or_else(|| file.storage.state_file.clone()),
            sound_command: file.sound.command.clone(),
            sound_file: file.sound.file.clone(),
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Guest support chat in the terminal")]
pub struct CliArgs {
    /// Base URL of the chat backend.
    #[arg(long, env = "GUESTCHAT_URL")]
    pub base_url: Option<String>,

    /// Path to config file (default: `~/.config/guestchat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the client state file (device id, name, sound preference).
    #[arg(long, env = "GUESTCHAT_STATE")]
    pub state_file: Option<PathBuf>,

    /// Seconds between polls for new messages.
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "GUESTCHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/guestchat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("guestchat").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
