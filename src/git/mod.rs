//! git
//!
//! Interface to the local git repository.
//!
//! # Architecture
//!
//! Ref resolution only needs to *read* configuration, so the read side is
//! split into the small [`GitConfigClient`] trait. Commands that rewire
//! remotes or push use the wider [`GitClient`]. Both are implemented by
//! [`Git`] (git2 plus the `git` executable for push and `@{push}`) and by
//! [`stub::StubGitClient`] for tests.
//!
//! # Example
//!
//! ```ignore
//! use ghr::git::{Git, GitConfigClient};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let config = git.read_branch_config("feature")?;
//! println!("merge ref: {:?}", config.merge_ref);
//! ```

mod interface;
pub mod stub;

pub use interface::{Git, GitError};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

/// Tracking configuration of a single branch (`branch.<name>.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchConfig {
    /// `branch.<name>.remote` when it names a remote.
    pub remote_name: Option<String>,
    /// `branch.<name>.remote` when it is a URL.
    pub remote_url: Option<Url>,
    /// `branch.<name>.merge`, e.g. `refs/heads/main`.
    pub merge_ref: Option<String>,
    /// `branch.<name>.pushRemote` when it names a remote.
    pub push_remote_name: Option<String>,
    /// `branch.<name>.pushRemote` when it is a URL.
    pub push_remote_url: Option<Url>,
    /// `branch.<name>.gh-merge-base`, recorded by `pr create --base`.
    pub merge_base: Option<String>,
}

/// Value of `push.default`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PushDefault {
    Nothing,
    Current,
    Upstream,
    Tracking,
    #[default]
    Simple,
    Matching,
}

impl FromStr for PushDefault {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(PushDefault::Nothing),
            "current" => Ok(PushDefault::Current),
            "upstream" => Ok(PushDefault::Upstream),
            "tracking" => Ok(PushDefault::Tracking),
            "simple" => Ok(PushDefault::Simple),
            "matching" => Ok(PushDefault::Matching),
            other => Err(GitError::InvalidConfig {
                key: "push.default".into(),
                value: other.into(),
            }),
        }
    }
}

/// A remote-tracking ref such as `refs/remotes/origin/feature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackingRef {
    pub remote: String,
    pub branch: String,
}

impl RemoteTrackingRef {
    /// Parse `refs/remotes/<remote>/<branch>`.
    ///
    /// The branch may itself contain slashes; the remote may not.
    pub fn parse(refname: &str) -> Result<Self, GitError> {
        let rest = refname
            .strip_prefix("refs/remotes/")
            .ok_or_else(|| GitError::InvalidRef(refname.to_string()))?;

        match rest.split_once('/') {
            Some((remote, branch)) if !remote.is_empty() && !branch.is_empty() => Ok(Self {
                remote: remote.to_string(),
                branch: branch.to_string(),
            }),
            _ => Err(GitError::InvalidRef(refname.to_string())),
        }
    }
}

impl fmt::Display for RemoteTrackingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "refs/remotes/{}/{}", self.remote, self.branch)
    }
}

/// A commit as listed for pull request defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub title: String,
    pub body: String,
}

/// A resolved ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowRef {
    pub hash: String,
    pub name: String,
}

/// A git remote as configured locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRemote {
    pub name: String,
    pub fetch_url: Option<Url>,
    pub push_url: Option<Url>,
    /// `remote.<name>.gh-resolved`.
    pub resolved: Option<String>,
}

/// Read-only access to the configuration used for ref resolution.
pub trait GitConfigClient: Send + Sync {
    /// Read `branch.<branch>.*`. A branch without configuration yields the default.
    fn read_branch_config(&self, branch: &str) -> Result<BranchConfig, GitError>;

    /// Read `push.default`, defaulting to `simple`.
    fn push_default(&self) -> Result<PushDefault, GitError>;

    /// Read `remote.pushDefault`.
    fn remote_push_default(&self) -> Result<Option<String>, GitError>;

    /// Resolve `<branch>@{push}`.
    fn push_revision(&self, branch: &str) -> Result<RemoteTrackingRef, GitError>;
}

/// Full git access needed by the pull request commands.
pub trait GitClient: GitConfigClient {
    /// This client, viewed through its read-only configuration interface.
    fn config_client(&self) -> &dyn GitConfigClient;

    /// Name of the checked out branch.
    fn current_branch(&self) -> Result<String, GitError>;

    /// Resolve each ref, omitting refs that do not exist.
    fn show_refs(&self, refs: &[String]) -> Result<Vec<ShowRef>, GitError>;

    /// All configured remotes.
    fn remotes(&self) -> Result<Vec<GitRemote>, GitError>;

    /// Add a remote, optionally restricting the fetched branches.
    fn add_remote(
        &self,
        name: &str,
        url: &str,
        tracking_branches: &[String],
    ) -> Result<GitRemote, GitError>;

    fn rename_remote(&self, old: &str, new: &str) -> Result<(), GitError>;

    /// Record `remote.<name>.gh-resolved`.
    fn set_remote_resolution(&self, name: &str, resolution: &str) -> Result<(), GitError>;

    /// Push `refspec` to `remote`, setting upstream tracking.
    fn push(&self, remote: &str, refspec: &str) -> Result<(), GitError>;

    /// Commits reachable from `head_ref` but not `base_ref`, newest first.
    ///
    /// An empty range is a [`GitError::NoCommits`].
    fn commits(&self, base_ref: &str, head_ref: &str) -> Result<Vec<Commit>, GitError>;

    /// Number of modified, staged, or untracked paths.
    fn uncommitted_change_count(&self) -> Result<usize, GitError>;

    /// Top-level directory of the working tree.
    fn repo_dir(&self) -> Result<PathBuf, GitError>;
}
