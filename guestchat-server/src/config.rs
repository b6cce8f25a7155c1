//! Server settings: where to listen, how long a guest message may be, and
//! how many guest requests a device gets per rate limit window.
//!
//! Values come from `--flags` (some also readable from `GUESTCHAT_SERVER_*`
//! variables), then the `[server]` table of
//! `~/.config/guestchat-server/config.toml`, then built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use guestchat_proto::message::MAX_CONTENT_LEN;

/// Errors that can occur when loading server configuration.
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

    /// A value was read but cannot be used.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name as written in the config file.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// On-disk shape. Every key is optional so a file can override just one.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerTable,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerTable {
    bind_addr: Option<String>,
    max_content_len: Option<usize>,
    rate_limit_requests: Option<u32>,
    rate_limit_window_secs: Option<u64>,
}

/// Command line of `guestchat-server`.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "GuestChat reference backend")]
pub struct ServerCliArgs {
    /// Listen address, e.g. `127.0.0.1:8787`.
    #[arg(short, long, env = "GUESTCHAT_SERVER_ADDR")]
    pub bind: Option<String>,

    /// Config file to read instead of the per-user default.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Longest guest message accepted, in characters.
    #[arg(long)]
    pub max_content_len: Option<usize>,

    /// Guest requests a device may make per window; 0 turns limiting off.
    #[arg(long)]
    pub rate_limit_requests: Option<u32>,

    /// Window length for the per-device request count, in seconds.
    #[arg(long)]
    pub rate_limit_window_secs: Option<u64>,

    /// `tracing` filter directive.
    #[arg(long, default_value = "info", env = "GUESTCHAT_SERVER_LOG")]
    pub log_level: String,
}

/// Settings the server runs with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: String,
    /// Guest messages longer than this are refused with 400.
    pub max_content_len: usize,
    /// Per-device request budget per window; 0 disables the limiter.
    pub rate_limit_requests: u32,
    /// Length of one rate limit window.
    pub rate_limit_window: Duration,
    /// `tracing` filter directive.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8787".to_string(),
            max_content_len: MAX_CONTENT_LEN,
            rate_limit_requests: 60,
            rate_limit_window: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Read the config file and combine it with `cli`.
    ///
    /// A missing file at the default location is fine; a missing file named
    /// with `--config` is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// the combined limits are unusable.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = match (&cli.config, default_path()) {
            (Some(path), _) => read_file(path)?,
            (None, Some(path)) => read_optional_file(&path)?,
            (None, None) => ServerConfigFile::default(),
        };
        let config = Self::merge(cli, &file.server);
        config.validate()?;
        Ok(config)
    }

    /// Whether guest requests are counted at all.
    #[must_use]
    pub const fn rate_limited(&self) -> bool {
        self.rate_limit_requests > 0
    }

    fn merge(cli: &ServerCliArgs, table: &ServerTable) -> Self {
        let fallback = Self::default();
        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| table.bind_addr.clone())
                .unwrap_or(fallback.bind_addr),
            max_content_len: cli
                .max_content_len
                .or(table.max_content_len)
                .unwrap_or(fallback.max_content_len),
            rate_limit_requests: cli
                .rate_limit_requests
                .or(table.rate_limit_requests)
                .unwrap_or(fallback.rate_limit_requests),
            rate_limit_window: cli
                .rate_limit_window_secs
                .or(table.rate_limit_window_secs)
                .map_or(fallback.rate_limit_window, Duration::from_secs),
            log_level: cli.log_level.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_content_len == 0 {
            return Err(ConfigError::Invalid {
                key: "max_content_len",
                reason: "must be at least 1",
            });
        }
        if self.rate_limited() && self.rate_limit_window.is_zero() {
            return Err(ConfigError::Invalid {
                key: "rate_limit_window_secs",
                reason: "must be positive while rate_limit_requests is set",
            });
        }
        Ok(())
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("guestchat-server").join("config.toml"))
}

fn read_file(path: &Path) -> Result<ServerConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

fn read_optional_file(path: &Path) -> Result<ServerConfigFile, ConfigError> {
    match read_file(path) {
        Err(ConfigError::ReadFile { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok(ServerConfigFile::default())
        }
        other => other,
    }
}
