//! TOML configuration for the hubtap binary.
//!
//! Reads `hubtap.toml` from the platform config directory:
//! - Windows:  `%APPDATA%\Hubtap\hubtap.toml`
//! - Linux:    `~/.config/hubtap/hubtap.toml` (or `$XDG_CONFIG_HOME`)
//! - macOS:    `~/Library/Application Support/Hubtap/hubtap.toml`
//!
//! Every field is serde-defaulted, so a missing file and a partial file both
//! work; command-line flags override whatever the file says.
//!
//! ```toml
//! [server]
//! url = "http://localhost:5000/chathub"
//!
//! [session]
//! handshake_timeout_secs = 15
//! keepalive_secs = 15
//! reconnect_delays_secs = [0, 2, 10, 30]
//!
//! [output]
//! quiet = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hubtap_client::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration for the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionTuning,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where `connect` without a URL goes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Default hub URL. `connect` with an explicit URL always wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Knobs forwarded into the session layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionTuning {
    /// Budget for dial plus handshake, in seconds.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Keep-alive ping interval, in seconds.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Reconnect delay ladder, in seconds; one attempt per entry.
    #[serde(default = "default_reconnect_delays_secs")]
    pub reconnect_delays_secs: Vec<u64>,
}

/// Console behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Suppress status messages on stderr. Payload output is unaffected.
    #[serde(default)]
    pub quiet: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_handshake_timeout_secs() -> u64 {
    15
}
fn default_keepalive_secs() -> u64 {
    15
}
fn default_reconnect_delays_secs() -> Vec<u64> {
    vec![0, 2, 10, 30]
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout_secs(),
            keepalive_secs: default_keepalive_secs(),
            reconnect_delays_secs: default_reconnect_delays_secs(),
        }
    }
}

impl AppConfig {
    /// Builds the session configuration this file describes.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handshake_timeout: Duration::from_secs(self.session.handshake_timeout_secs),
            keepalive_interval: Duration::from_secs(self.session.keepalive_secs),
            reconnect_delays: self
                .session
                .reconnect_delays_secs
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            ..SessionConfig::default()
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(dir.join("hubtap.toml"))
}

/// Loads the config from the platform path, falling back to defaults when no
/// file exists yet.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

/// Loads the config from an explicit path. Unlike [`load_config`], a missing
/// file is an error here: the user asked for this file specifically.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Hubtap"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("hubtap"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Hubtap")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_session_layer() {
        let config = AppConfig::default();
        let session = config.session_config();

        assert_eq!(session.handshake_timeout, Duration::from_secs(15));
        assert_eq!(session.keepalive_interval, Duration::from_secs(15));
        assert_eq!(
            session.reconnect_delays,
            vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ]
        );
        assert!(config.server.url.is_none());
        assert!(!config.output.quiet);
    }

    #[test]
    fn test_empty_file_parses_to_defaults() {
        let config: AppConfig = toml::from_str("").expect("empty config is valid");

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let config: AppConfig = toml::from_str(
            "[server]\nurl = \"http://localhost:5000/chathub\"\n\n[session]\nkeepalive_secs = 5\n",
        )
        .expect("partial config is valid");

        assert_eq!(
            config.server.url.as_deref(),
            Some("http://localhost:5000/chathub")
        );
        assert_eq!(config.session.keepalive_secs, 5);
        // untouched fields fall back to their defaults
        assert_eq!(config.session.handshake_timeout_secs, 15);
        assert_eq!(config.session.reconnect_delays_secs, vec![0, 2, 10, 30]);
    }

    #[test]
    fn test_reconnect_ladder_converts_to_durations_in_order() {
        let config: AppConfig =
            toml::from_str("[session]\nreconnect_delays_secs = [1, 3]\n").expect("valid config");

        assert_eq!(
            config.session_config().reconnect_delays,
            vec![Duration::from_secs(1), Duration::from_secs(3)]
        );
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str("[server\nurl = nope");

        assert!(result.is_err(), "malformed TOML must not parse");
    }

    #[test]
    fn test_round_trip_preserves_settings() {
        let mut config = AppConfig::default();
        config.server.url = Some("http://hub.example.com/live".to_owned());
        config.output.quiet = true;

        let text = toml::to_string(&config).expect("serialize");
        let restored: AppConfig = toml::from_str(&text).expect("deserialize");

        assert_eq!(config, restored);
    }

    #[test]
    fn test_explicit_path_requires_the_file_to_exist() {
        let result = load_config_from(Path::new("/nonexistent/hubtap.toml"));

        assert!(
            matches!(result, Err(ConfigError::Io { .. })),
            "an explicitly named config file must exist"
        );
    }
}
