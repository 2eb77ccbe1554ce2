//! Runtime configuration, loaded from an optional TOML file and overridden
//! by CLI flags, following the teacher crate's `Config::from_file` +
//! `validate()` pattern.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_LINE_WRAP;
use crate::error::{Error, Result};

/// Default TCP port QuickFT listens on / connects to.
pub const DEFAULT_PORT: u16 = 29_765;
/// Default cap on concurrently active server workers.
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;
/// Default per-frame deadline, in seconds.
pub const DEFAULT_TFRAME_SECS: u64 = 30;
/// Default per-ACK deadline, in seconds.
pub const DEFAULT_TACK_SECS: u64 = 8;
/// Default ceiling on a FILE_SND request's declared `length`, bounding the
/// hostile-length scenario called out in the design notes. 256 MiB.
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 256 * 1024 * 1024;

/// Server and client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the server binds to, or the client connects to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory the server confines all file operations to.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Maximum number of concurrently active server workers.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Per-frame deadline (`Tframe`), in seconds.
    #[serde(default = "default_tframe_secs")]
    pub frame_timeout_secs: u64,

    /// Per-ACK deadline (`Tack`), in seconds.
    #[serde(default = "default_tack_secs")]
    pub ack_timeout_secs: u64,

    /// Base64 line-wrap width used when encoding outgoing content.
    #[serde(default = "default_line_wrap")]
    pub base64_line_wrap: usize,

    /// Maximum accepted `length` on a FILE_SND request, rejected before any
    /// allocation or disk write is attempted.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: u64,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path this config was loaded from, if any. Not serialized.
    #[serde(skip)]
    pub config_file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            root_dir: default_root_dir(),
            max_connections: default_max_connections(),
            frame_timeout_secs: default_tframe_secs(),
            ack_timeout_secs: default_tack_secs(),
            base64_line_wrap: default_line_wrap(),
            max_content_length: default_max_content_length(),
            logging: LoggingConfig::default(),
            config_file_path: None,
        }
    }
}

impl Config {
    /// Loads a config from a TOML file, falling back to defaults for any
    /// field left unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
        config.config_file_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Checks internal consistency: non-zero timeouts, a usable line wrap,
    /// at least one permitted connection, and a root directory that exists
    /// or can be created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_string()));
        }
        if self.frame_timeout_secs == 0 {
            return Err(Error::Config("frame_timeout_secs must be > 0".to_string()));
        }
        if self.ack_timeout_secs == 0 {
            return Err(Error::Config("ack_timeout_secs must be > 0".to_string()));
        }
        if self.base64_line_wrap < crate::codec::MIN_LINE_WRAP {
            return Err(Error::Config(format!(
                "base64_line_wrap must be >= {}",
                crate::codec::MIN_LINE_WRAP
            )));
        }
        if self.max_content_length == 0 {
            return Err(Error::Config("max_content_length must be > 0".to_string()));
        }
        if !self.root_dir.exists() {
            std::fs::create_dir_all(&self.root_dir)
                .map_err(|e| Error::Config(format!("creating root_dir {}: {e}", self.root_dir.display())))?;
        }
        Ok(())
    }

    /// `Tframe` as a [`std::time::Duration`].
    #[must_use]
    pub const fn frame_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.frame_timeout_secs)
    }

    /// `Tack` as a [`std::time::Duration`].
    #[must_use]
    pub const fn ack_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ack_timeout_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable compact text, suitable for a terminal.
    Text,
    /// Newline-delimited JSON, suitable for log aggregation.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Text
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for rolling log files; `None` logs to stderr.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Base filename for rolling log files.
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_tframe_secs() -> u64 {
    DEFAULT_TFRAME_SECS
}

fn default_tack_secs() -> u64 {
    DEFAULT_TACK_SECS
}

fn default_line_wrap() -> usize {
    DEFAULT_LINE_WRAP
}

fn default_max_content_length() -> u64 {
    DEFAULT_MAX_CONTENT_LENGTH
}

fn default_log_file_prefix() -> String {
    "quickft".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.port, 29_765);
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.frame_timeout_secs, 30);
        assert_eq!(config.ack_timeout_secs, 8);
        assert_eq!(config.base64_line_wrap, 72);
    }

    #[test]
    fn rejects_zero_max_connections() {
        let mut config = Config::default();
        config.root_dir = std::env::temp_dir();
        config.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_too_small_line_wrap() {
        let mut config = Config::default();
        config.root_dir = std::env::temp_dir();
        config.base64_line_wrap = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn creates_missing_root_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root_dir = dir.path().join("created-by-validate");
        assert!(!config.root_dir.exists());
        config.validate().unwrap();
        assert!(config.root_dir.exists());
    }
}
