//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Environment variables
//! 4. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$GHR_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/ghr/config.toml`
//! 3. `~/.config/ghr/config.toml`
//!
//! # Environment
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `GH_TOKEN`, `GITHUB_TOKEN` | token for github.com |
//! | `GH_ENTERPRISE_TOKEN`, `GITHUB_ENTERPRISE_TOKEN` | token for other hosts |
//! | `GH_HOST` | default host |
//! | `GH_REPO` | base repository override |
//! | `GH_EDITOR`, `VISUAL`, `EDITOR` | editor command |
//! | `GH_BROWSER`, `BROWSER` | browser command |
//! | `GH_PROMPT_DISABLED` | disable interactive prompts |
//!
//! The environment is captured once when the config is loaded.
//!
//! # Example
//!
//! ```no_run
//! use ghr::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! let host = config.default_host();
//! println!("Host: {}, authenticated: {}", host, config.token(&host).is_some());
//! ```

pub mod schema;

pub use schema::{FileConfig, HostConfig};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::types::{GitProtocol, DEFAULT_HOST};

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Environment variables consulted by [`Config`].
const ENV_KEYS: &[&str] = &[
    "GH_TOKEN",
    "GITHUB_TOKEN",
    "GH_ENTERPRISE_TOKEN",
    "GITHUB_ENTERPRISE_TOKEN",
    "GH_HOST",
    "GH_REPO",
    "GH_EDITOR",
    "VISUAL",
    "EDITOR",
    "GH_BROWSER",
    "BROWSER",
    "GH_PROMPT_DISABLED",
];

/// Merged configuration from the config file and the environment.
///
/// Accessor methods apply precedence rules automatically.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed config file (defaults when absent)
    pub file: FileConfig,
    /// Path the file was loaded from
    path: Option<PathBuf>,
    /// Snapshot of the relevant environment variables
    env: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from the default location and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    /// A missing config file is not an error (defaults are used).
    pub fn load() -> Result<Self, ConfigError> {
        let env = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();

        let (file, path) = match Self::find_config_file() {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                (Self::load_file(&path)?, Some(path))
            }
            None => (FileConfig::default(), None),
        };

        Ok(Self { file, path, env })
    }

    /// Build a config from explicit parts.
    pub fn from_parts<K, V>(file: FileConfig, env: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            file,
            path: None,
            env: env
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        // 1. Check $GHR_CONFIG
        if let Ok(path) = std::env::var("GHR_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/ghr/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("ghr/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.config/ghr/config.toml
        let path = dirs::home_dir()?.join(".config/ghr/config.toml");
        path.exists().then_some(path)
    }

    /// Read, parse and validate a config file.
    pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn env(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn host_config(&self, host: &str) -> Option<&HostConfig> {
        self.file.hosts.get(&host.to_lowercase())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Host used when no repository context says otherwise.
    ///
    /// `GH_HOST`, defaulting to `github.com`.
    pub fn default_host(&self) -> String {
        self.env("GH_HOST").unwrap_or(DEFAULT_HOST).to_lowercase()
    }

    /// API token for `host`.
    ///
    /// Environment tokens win over the config file. github.com reads
    /// `GH_TOKEN` then `GITHUB_TOKEN`; other hosts read the enterprise
    /// variants.
    pub fn token(&self, host: &str) -> Option<String> {
        let keys: &[&str] = if host.eq_ignore_ascii_case(DEFAULT_HOST) {
            &["GH_TOKEN", "GITHUB_TOKEN"]
        } else {
            &["GH_ENTERPRISE_TOKEN", "GITHUB_ENTERPRISE_TOKEN"]
        };

        keys.iter()
            .find_map(|key| self.env(key))
            .map(str::to_string)
            .or_else(|| self.host_config(host).and_then(|h| h.token.clone()))
    }

    /// Protocol for remotes added on `host`.
    pub fn git_protocol(&self, host: &str) -> GitProtocol {
        self.host_config(host)
            .and_then(|h| h.git_protocol.as_deref())
            .or(self.file.git_protocol.as_deref())
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }

    /// Login recorded for `host`, if any.
    pub fn user(&self, host: &str) -> Option<&str> {
        self.host_config(host).and_then(|h| h.user.as_deref())
    }

    /// Base repository override from `GH_REPO`.
    pub fn repo_override(&self) -> Option<&str> {
        self.env("GH_REPO")
    }

    /// Editor command: `GH_EDITOR`, config, `VISUAL`, `EDITOR`.
    pub fn editor(&self) -> Option<String> {
        self.env("GH_EDITOR")
            .or(self.file.editor.as_deref())
            .or_else(|| self.env("VISUAL"))
            .or_else(|| self.env("EDITOR"))
            .map(str::to_string)
    }

    /// Browser command: `GH_BROWSER`, config, `BROWSER`.
    pub fn browser(&self) -> Option<String> {
        self.env("GH_BROWSER")
            .or(self.file.browser.as_deref())
            .or_else(|| self.env("BROWSER"))
            .map(str::to_string)
    }

    /// Whether interactive prompts are disabled.
    pub fn prompt_disabled(&self) -> bool {
        match self.env("GH_PROMPT_DISABLED") {
            Some(value) => !matches!(value, "0" | "false"),
            None => self.file.prompt.as_deref() == Some("disabled"),
        }
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
