//! TOML daemon settings.
//!
//! Read from `--settings <FILE>` when given, otherwise from the platform
//! config path (`$XDG_CONFIG_HOME/ivi-wm/settings.toml` or
//! `~/.config/ivi-wm/settings.toml`). A missing file yields the defaults,
//! and every field carries a serde default so partial files work across
//! upgrades.
//!
//! ```toml
//! socket_path = "/tmp/ivi-wm.sock"
//! log_level = "debug"
//! on_compositor_error = "fail-fast"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// What to do when the compositor rejects a relayed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryErrorPolicy {
    /// Keep running; the failure becomes a negative status on the command
    /// that caused it.
    #[default]
    Report,
    /// Escalate out of the reactor loop and let the daemon exit.
    FailFast,
}

/// Daemon settings stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path of the unix control socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// `tracing` log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub on_compositor_error: BoundaryErrorPolicy,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/ivi-wm.sock")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_level: default_log_level(),
            on_compositor_error: BoundaryErrorPolicy::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` when given, otherwise from the platform
    /// config file. Absent files yield `Settings::default()`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match settings_file_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }
}

/// `$XDG_CONFIG_HOME/ivi-wm/settings.toml`, falling back to
/// `~/.config/ivi-wm/settings.toml`.
fn settings_file_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("ivi-wm").join("settings.toml"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
