//! core::types
//!
//! Repository identity shared by every layer.
//!
//! # Design
//!
//! A [`Repo`] is the (host, owner, name) triple that identifies a repository
//! on a forge. It is parsed from remote URLs, `OWNER/REPO` arguments, and
//! pull request URLs. Comparisons between repositories are case-insensitive,
//! matching how the hosting service treats owner and repository names.
//!
//! # Example
//!
//! ```
//! use ghr::core::types::Repo;
//!
//! let repo = Repo::from_url("git@github.com:octo/hello.git").unwrap();
//! assert_eq!(repo.full_name(), "octo/hello");
//! assert!(repo.is_same(&Repo::new("OCTO", "Hello")));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// The default host when none is given.
pub const DEFAULT_HOST: &str = "github.com";

/// Errors from parsing repository identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoParseError {
    /// Input is not `OWNER/REPO` or `HOST/OWNER/REPO`.
    #[error("expected the \"[HOST/]OWNER/REPO\" format, got \"{0}\"")]
    InvalidFullName(String),

    /// URL could not be parsed at all.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// URL path does not name exactly one repository.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// URL has no host component.
    #[error("no hostname detected")]
    NoHost,
}

/// A repository on a forge host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repo {
    host: String,
    owner: String,
    name: String,
}

impl Repo {
    /// Create a repository on the default host.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_host(DEFAULT_HOST, owner, name)
    }

    /// Create a repository on a specific host.
    pub fn with_host(
        host: impl Into<String>,
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            host: normalize_host(&host.into()),
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Host name, lowercased.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Owning user or organization.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Case-insensitive identity comparison.
    pub fn is_same(&self, other: &Repo) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner)
            && self.name.eq_ignore_ascii_case(&other.name)
            && self.host.eq_ignore_ascii_case(&other.host)
    }

    /// Parse `OWNER/REPO` or `HOST/OWNER/REPO`.
    ///
    /// The two-part form uses `default_host`.
    pub fn from_full_name(input: &str, default_host: &str) -> Result<Self, RepoParseError> {
        if input.contains("://") || input.starts_with("git@") {
            return Self::from_url(input);
        }

        let parts: Vec<&str> = input.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(RepoParseError::InvalidFullName(input.to_string()));
        }

        match parts.as_slice() {
            [owner, name] => Ok(Self::with_host(default_host, *owner, *name)),
            [host, owner, name] => Ok(Self::with_host(*host, *owner, *name)),
            _ => Err(RepoParseError::InvalidFullName(input.to_string())),
        }
    }

    /// Parse a git remote URL or web URL.
    ///
    /// Accepts `https://`, `http://`, `ssh://`, `git://`, `git+ssh://` and
    /// scp-like `user@host:owner/repo.git` forms.
    pub fn from_url(input: &str) -> Result<Self, RepoParseError> {
        let url = parse_remote_url(input)?;
        Self::from_parsed_url(&url)
    }

    /// Extract a repository from an already-parsed URL.
    pub fn from_parsed_url(url: &Url) -> Result<Self, RepoParseError> {
        let host = url.host_str().ok_or(RepoParseError::NoHost)?;

        let path = url.path().trim_start_matches('/');
        let parts: Vec<&str> = path.splitn(3, '/').collect();
        if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(RepoParseError::InvalidPath(url.path().to_string()));
        }
        // Only a trailing slash is tolerated after owner/name.
        if parts.len() == 3 && !parts[2].is_empty() {
            return Err(RepoParseError::InvalidPath(url.path().to_string()));
        }

        let name = parts[1].strip_suffix(".git").unwrap_or(parts[1]);
        Ok(Self::with_host(host, parts[0], name))
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host == DEFAULT_HOST {
            write!(f, "{}/{}", self.owner, self.name)
        } else {
            write!(f, "{}/{}/{}", self.host, self.owner, self.name)
        }
    }
}

/// Protocol used when constructing remote URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProtocol {
    #[default]
    Https,
    Ssh,
}

impl std::str::FromStr for GitProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "https" => Ok(GitProtocol::Https),
            "ssh" => Ok(GitProtocol::Ssh),
            other => Err(format!("invalid git protocol '{}', must be https or ssh", other)),
        }
    }
}

/// Build the clone URL of a repository for the given protocol.
pub fn format_remote_url(repo: &Repo, protocol: GitProtocol) -> String {
    match protocol {
        GitProtocol::Ssh => format!("git@{}:{}/{}.git", repo.host, repo.owner, repo.name),
        GitProtocol::Https => format!("https://{}/{}/{}.git", repo.host, repo.owner, repo.name),
    }
}

/// Build a web URL below the repository root.
pub fn web_url(repo: &Repo, path: &str) -> String {
    let base = format!("https://{}/{}/{}", repo.host, repo.owner, repo.name);
    if path.is_empty() {
        base
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Parse a remote URL, translating scp-like syntax into `ssh://`.
pub fn parse_remote_url(input: &str) -> Result<Url, RepoParseError> {
    let normalized = if is_scp_like(input) {
        let (user_host, path) = input.split_once(':').unwrap_or((input, ""));
        format!("ssh://{}/{}", user_host, path.trim_start_matches('/'))
    } else {
        input.to_string()
    };

    let mut url =
        Url::parse(&normalized).map_err(|e| RepoParseError::InvalidUrl(format!("{e}: {input}")))?;

    if url.scheme() == "git+ssh" {
        let rewritten = url.as_str().replacen("git+ssh://", "ssh://", 1);
        url = Url::parse(&rewritten)
            .map_err(|e| RepoParseError::InvalidUrl(format!("{e}: {input}")))?;
    }

    Ok(url)
}

fn is_scp_like(input: &str) -> bool {
    !input.contains("://")
        && input
            .split_once(':')
            .map(|(host, _)| !host.is_empty() && !host.contains('/'))
            .unwrap_or(false)
}

fn normalize_host(host: &str) -> String {
    let lower = host.to_ascii_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}
