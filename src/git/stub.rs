//! git::stub
//!
//! In-memory [`GitClient`] for deterministic testing.
//!
//! # Example
//!
//! ```
//! use ghr::git::stub::StubGitClient;
//! use ghr::git::{GitConfigClient, RemoteTrackingRef};
//!
//! let git = StubGitClient::new().with_push_revision(
//!     "feature",
//!     RemoteTrackingRef { remote: "origin".into(), branch: "feature".into() },
//! );
//! assert_eq!(git.push_revision("feature").unwrap().remote, "origin");
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    BranchConfig, Commit, GitClient, GitConfigClient, GitError, GitRemote, PushDefault,
    RemoteTrackingRef, ShowRef,
};
use crate::core::types::parse_remote_url;

/// Stub git client. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct StubGitClient {
    inner: Arc<Mutex<StubInner>>,
}

#[derive(Debug, Default)]
struct StubInner {
    branch_configs: HashMap<String, BranchConfig>,
    branch_config_error: Option<String>,
    push_default: PushDefault,
    push_default_error: Option<String>,
    remote_push_default: Option<String>,
    remote_push_default_error: Option<String>,
    push_revisions: HashMap<String, RemoteTrackingRef>,
    current_branch: Option<String>,
    refs: HashMap<String, String>,
    remotes: Vec<GitRemote>,
    commits: Vec<Commit>,
    uncommitted: usize,
    failing_pushes: usize,
    repo_dir: PathBuf,
    operations: Vec<GitOperation>,
}

/// Recorded call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitOperation {
    ReadBranchConfig { branch: String },
    PushDefault,
    RemotePushDefault,
    PushRevision { branch: String },
    AddRemote { name: String, url: String },
    RenameRemote { old: String, new: String },
    SetRemoteResolution { name: String, resolution: String },
    Push { remote: String, refspec: String },
}

impl StubGitClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: GitOperation) {
        self.lock().operations.push(op);
    }

    pub fn with_branch_config(self, branch: &str, config: BranchConfig) -> Self {
        self.lock().branch_configs.insert(branch.to_string(), config);
        self
    }

    pub fn with_branch_config_error(self, message: &str) -> Self {
        self.lock().branch_config_error = Some(message.to_string());
        self
    }

    pub fn with_push_default(self, value: PushDefault) -> Self {
        self.lock().push_default = value;
        self
    }

    pub fn with_push_default_error(self, message: &str) -> Self {
        self.lock().push_default_error = Some(message.to_string());
        self
    }

    pub fn with_remote_push_default(self, remote: &str) -> Self {
        self.lock().remote_push_default = Some(remote.to_string());
        self
    }

    pub fn with_remote_push_default_error(self, message: &str) -> Self {
        self.lock().remote_push_default_error = Some(message.to_string());
        self
    }

    pub fn with_push_revision(self, branch: &str, target: RemoteTrackingRef) -> Self {
        self.lock().push_revisions.insert(branch.to_string(), target);
        self
    }

    pub fn with_current_branch(self, branch: &str) -> Self {
        self.lock().current_branch = Some(branch.to_string());
        self
    }

    /// Make `refname` resolve to `hash`.
    pub fn with_ref(self, refname: &str, hash: &str) -> Self {
        self.lock()
            .refs
            .insert(refname.to_string(), hash.to_string());
        self
    }

    /// Add a remote whose fetch and push URLs are `url`.
    pub fn with_remote(self, name: &str, url: &str) -> Self {
        let parsed = parse_remote_url(url).ok();
        self.lock().remotes.push(GitRemote {
            name: name.to_string(),
            fetch_url: parsed.clone(),
            push_url: parsed,
            resolved: None,
        });
        self
    }

    /// Commits returned by [`GitClient::commits`], newest first.
    pub fn with_commits(self, commits: Vec<Commit>) -> Self {
        self.lock().commits = commits;
        self
    }

    pub fn with_uncommitted_changes(self, count: usize) -> Self {
        self.lock().uncommitted = count;
        self
    }

    /// Fail the next `count` pushes. `usize::MAX` fails every push.
    pub fn with_failing_pushes(self, count: usize) -> Self {
        self.lock().failing_pushes = count;
        self
    }

    pub fn with_repo_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.lock().repo_dir = dir.into();
        self
    }

    /// All recorded calls.
    pub fn operations(&self) -> Vec<GitOperation> {
        self.lock().operations.clone()
    }

    /// Number of push attempts made.
    pub fn push_attempts(&self) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|op| matches!(op, GitOperation::Push { .. }))
            .count()
    }

    /// Current remotes, including any added or renamed through the stub.
    pub fn remote_names(&self) -> Vec<String> {
        self.lock().remotes.iter().map(|r| r.name.clone()).collect()
    }
}

fn stub_error(message: &str) -> GitError {
    GitError::Internal {
        message: message.to_string(),
    }
}

impl GitConfigClient for StubGitClient {
    fn read_branch_config(&self, branch: &str) -> Result<BranchConfig, GitError> {
        self.record(GitOperation::ReadBranchConfig {
            branch: branch.to_string(),
        });
        let inner = self.lock();
        if let Some(message) = &inner.branch_config_error {
            return Err(stub_error(message));
        }
        Ok(inner.branch_configs.get(branch).cloned().unwrap_or_default())
    }

    fn push_default(&self) -> Result<PushDefault, GitError> {
        self.record(GitOperation::PushDefault);
        let inner = self.lock();
        match &inner.push_default_error {
            Some(message) => Err(stub_error(message)),
            None => Ok(inner.push_default),
        }
    }

    fn remote_push_default(&self) -> Result<Option<String>, GitError> {
        self.record(GitOperation::RemotePushDefault);
        let inner = self.lock();
        match &inner.remote_push_default_error {
            Some(message) => Err(stub_error(message)),
            None => Ok(inner.remote_push_default.clone()),
        }
    }

    fn push_revision(&self, branch: &str) -> Result<RemoteTrackingRef, GitError> {
        self.record(GitOperation::PushRevision {
            branch: branch.to_string(),
        });
        self.lock()
            .push_revisions
            .get(branch)
            .cloned()
            .ok_or_else(|| GitError::CommandFailed {
                command: "git rev-parse".into(),
                message: format!("could not resolve {branch}@{{push}}"),
            })
    }
}

impl GitClient for StubGitClient {
    fn config_client(&self) -> &dyn GitConfigClient {
        self
    }

    fn current_branch(&self) -> Result<String, GitError> {
        self.lock()
            .current_branch
            .clone()
            .ok_or(GitError::NotOnAnyBranch)
    }

    fn show_refs(&self, refs: &[String]) -> Result<Vec<ShowRef>, GitError> {
        let inner = self.lock();
        Ok(refs
            .iter()
            .filter_map(|name| {
                inner.refs.get(name).map(|hash| ShowRef {
                    hash: hash.clone(),
                    name: name.clone(),
                })
            })
            .collect())
    }

    fn remotes(&self) -> Result<Vec<GitRemote>, GitError> {
        Ok(self.lock().remotes.clone())
    }

    fn add_remote(
        &self,
        name: &str,
        url: &str,
        _tracking_branches: &[String],
    ) -> Result<GitRemote, GitError> {
        self.record(GitOperation::AddRemote {
            name: name.to_string(),
            url: url.to_string(),
        });
        let parsed = parse_remote_url(url).ok();
        let remote = GitRemote {
            name: name.to_string(),
            fetch_url: parsed.clone(),
            push_url: parsed,
            resolved: None,
        };
        self.lock().remotes.push(remote.clone());
        Ok(remote)
    }

    fn rename_remote(&self, old: &str, new: &str) -> Result<(), GitError> {
        self.record(GitOperation::RenameRemote {
            old: old.to_string(),
            new: new.to_string(),
        });
        let mut inner = self.lock();
        let remote = inner
            .remotes
            .iter_mut()
            .find(|r| r.name == old)
            .ok_or_else(|| stub_error(&format!("no such remote '{old}'")))?;
        remote.name = new.to_string();
        Ok(())
    }

    fn set_remote_resolution(&self, name: &str, resolution: &str) -> Result<(), GitError> {
        self.record(GitOperation::SetRemoteResolution {
            name: name.to_string(),
            resolution: resolution.to_string(),
        });
        if let Some(remote) = self.lock().remotes.iter_mut().find(|r| r.name == name) {
            remote.resolved = Some(resolution.to_string());
        }
        Ok(())
    }

    fn push(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        self.record(GitOperation::Push {
            remote: remote.to_string(),
            refspec: refspec.to_string(),
        });
        let mut inner = self.lock();
        if inner.failing_pushes > 0 {
            if inner.failing_pushes != usize::MAX {
                inner.failing_pushes -= 1;
            }
            return Err(GitError::CommandFailed {
                command: "git push".into(),
                message: "exit status 128".into(),
            });
        }
        Ok(())
    }

    fn commits(&self, base_ref: &str, head_ref: &str) -> Result<Vec<Commit>, GitError> {
        let commits = self.lock().commits.clone();
        if commits.is_empty() {
            return Err(GitError::NoCommits {
                base: base_ref.to_string(),
                head: head_ref.to_string(),
            });
        }
        Ok(commits)
    }

    fn uncommitted_change_count(&self) -> Result<usize, GitError> {
        Ok(self.lock().uncommitted)
    }

    fn repo_dir(&self) -> Result<PathBuf, GitError> {
        Ok(self.lock().repo_dir.clone())
    }
}
