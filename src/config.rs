//! # Client Configuration
//!
//! `ClientConfig` collects the handful of settings a caller can override
//! before opening a [`crate::protocol::ServerConnection`] or loading
//! profiles: network defaults plus the platform-dependent profile root,
//! loaded from an optional TOML file and merged over built-in defaults.
//!
//! The defaults hold even with no file present at all — a caller embedding
//! the library rarely ships a config file next to it.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MensagoError, Result};

/// Default server port.
pub const DEFAULT_PORT: u16 = 2001;
/// Default streaming read/write chunk size.
pub const DEFAULT_BUFFER_SIZE: usize = 16384;

/// On-disk, all-optional mirror of [`ClientConfig`], deserialized from
/// `mensago-client.toml` and then merged over the built-in defaults.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    profile_root: Option<PathBuf>,
    server_port: Option<u16>,
    connect_timeout_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    buffer_size: Option<usize>,
}

/// Settings a caller may override; everything has a sensible default so a
/// `ClientConfig::default()` is immediately usable.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub profile_root: PathBuf,
    pub server_port: u16,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            profile_root: default_profile_root(),
            server_port: DEFAULT_PORT,
            connect_timeout: crate::protocol::connection::CONNECT_TIMEOUT,
            idle_timeout: crate::protocol::connection::IDLE_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    /// Loads `path` (a TOML file) and merges it over the defaults. A
    /// missing file is not an error — the defaults are returned as-is.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }

        let text = std::fs::read_to_string(path)?;
        let raw: RawConfig = toml::from_str(&text)
            .map_err(|e| MensagoError::BadData(format!("invalid client config: {e}")))?;

        if let Some(root) = raw.profile_root {
            config.profile_root = root;
        }
        if let Some(port) = raw.server_port {
            config.server_port = port;
        }
        if let Some(secs) = raw.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = raw.idle_timeout_secs {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = raw.buffer_size {
            config.buffer_size = size;
        }
        Ok(config)
    }
}

/// `%LOCALAPPDATA%\mensago` on Windows, `$HOME/.config/mensago` elsewhere.
pub fn default_profile_root() -> PathBuf {
    if cfg!(target_os = "windows") {
        let base = std::env::var_os("LOCALAPPDATA").unwrap_or_default();
        PathBuf::from(base).join("mensago")
    } else {
        let base = std::env::var_os("HOME").unwrap_or_default();
        PathBuf::from(base).join(".config").join("mensago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_network_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_port, DEFAULT_PORT);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let config = ClientConfig::load(std::path::Path::new("/nonexistent/mensago-client.toml"))
            .unwrap();
        assert_eq!(config.server_port, DEFAULT_PORT);
    }

    #[test]
    fn load_merges_overrides_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mensago-client.toml");
        std::fs::write(&path, "server_port = 3000\n").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }
}
