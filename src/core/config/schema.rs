//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$GHR_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/ghr/config.toml`
//! 3. `~/.config/ghr/config.toml`
//!
//! # Validation
//!
//! Config values are validated after parsing: protocol names must be known
//! and `prompt` must be `enabled` or `disabled`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::GitProtocol;

/// Contents of the configuration file.
///
/// # Example
///
/// ```toml
/// git_protocol = "ssh"
/// editor = "vim"
/// prompt = "enabled"
///
/// [hosts."github.com"]
/// user = "monalisa"
/// token = "ghp_..."
///
/// [hosts."ghe.example.com"]
/// git_protocol = "https"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Protocol for new remotes: "https" or "ssh"
    pub git_protocol: Option<String>,

    /// Editor command for composing text
    pub editor: Option<String>,

    /// Browser command for opening URLs
    pub browser: Option<String>,

    /// "enabled" or "disabled"
    pub prompt: Option<String>,

    /// Per-host settings keyed by hostname
    pub hosts: BTreeMap<String, HostConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(protocol) = &self.git_protocol {
            validate_protocol(protocol)?;
        }

        if let Some(prompt) = &self.prompt {
            if !matches!(prompt.as_str(), "enabled" | "disabled") {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid prompt setting '{}', must be one of: enabled, disabled",
                    prompt
                )));
            }
        }

        for (host, config) in &self.hosts {
            if host.is_empty() {
                return Err(ConfigError::InvalidValue("host name cannot be empty".into()));
            }
            config.validate()?;
        }

        Ok(())
    }
}

/// Settings for one host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// API token
    pub token: Option<String>,

    /// Protocol override for this host
    pub git_protocol: Option<String>,

    /// Login of the authenticated user
    pub user: Option<String>,
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(protocol) = &self.git_protocol {
            validate_protocol(protocol)?;
        }
        Ok(())
    }
}

fn validate_protocol(value: &str) -> Result<(), ConfigError> {
    value
        .parse::<GitProtocol>()
        .map(|_| ())
        .map_err(|_| {
            ConfigError::InvalidValue(format!(
                "invalid git_protocol '{}', must be one of: https, ssh",
                value
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn parses_hosts() {
        let config: FileConfig = toml::from_str(
            r#"
            git_protocol = "ssh"

            [hosts."github.com"]
            user = "monalisa"
            token = "abc"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        let host = &config.hosts["github.com"];
        assert_eq!(host.user.as_deref(), Some("monalisa"));
        assert_eq!(host.token.as_deref(), Some("abc"));
    }

    #[test]
    fn invalid_protocol_rejected() {
        let config = FileConfig {
            git_protocol: Some("ftp".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_prompt_rejected() {
        let config = FileConfig {
            prompt: Some("sometimes".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_field_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("pager = \"less\"");
        assert!(result.is_err());
    }
}
