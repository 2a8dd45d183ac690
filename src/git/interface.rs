//! git::interface
//!
//! Git implementation backed by git2 and the `git` executable.
//!
//! Configuration, refs, remotes, status and history are read with git2.
//! A few operations shell out instead. `push` needs the user's credential
//! helpers and prints its progress straight to the terminal. libgit2 has no
//! `@{push}` resolution, and its remote rename leaves narrowed fetch
//! refspecs pointing at the old name.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::NotOnAnyBranch`]: HEAD is detached
//! - [`GitError::CommandFailed`]: A `git` subprocess exited unsuccessfully
//!
//! # Example
//!
//! ```ignore
//! use ghr::git::{Git, GitClient};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! println!("on branch {}", git.current_branch()?);
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use super::{
    BranchConfig, Commit, GitClient, GitConfigClient, GitRemote, PushDefault, RemoteTrackingRef,
    ShowRef,
};
use crate::core::types::parse_remote_url;

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// HEAD does not point at a branch.
    #[error("git: not on any branch")]
    NotOnAnyBranch,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// A ref name has an unexpected shape.
    #[error("invalid ref: {0}")]
    InvalidRef(String),

    /// A commit range has nothing in it.
    #[error("could not find any commits between {base} and {head}")]
    NoCommits { base: String, head: String },

    /// A configuration value could not be interpreted.
    #[error("invalid value '{value}' for {key}")]
    InvalidConfig { key: String, value: String },

    /// A `git` subprocess failed.
    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal { message: String },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

/// Git repository handle.
///
/// The git2 repository is not `Sync`, so it sits behind a mutex; every
/// operation is short and never holds the lock across a subprocess call.
pub struct Git {
    repo: Mutex<git2::Repository>,
    workdir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("workdir", &self.workdir)
            .finish()
    }
}

impl Git {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let workdir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(Self {
            repo: Mutex::new(repo),
            workdir,
        })
    }

    fn with_repo<T>(
        &self,
        f: impl FnOnce(&git2::Repository) -> Result<T, GitError>,
    ) -> Result<T, GitError> {
        let repo = self.repo.lock().map_err(|_| GitError::Internal {
            message: "repository handle poisoned".into(),
        })?;
        f(&repo)
    }

    fn config_string(&self, key: &str) -> Result<Option<String>, GitError> {
        self.with_repo(|repo| {
            let config = repo.config()?;
            match config.get_string(key) {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir);
        cmd
    }
}

/// Sort a `branch.<name>.remote`-style value into a name or a URL.
///
/// Filesystem paths are neither and are ignored.
fn classify_remote_value(value: String) -> (Option<String>, Option<url::Url>) {
    if value.contains(':') {
        (None, parse_remote_url(&value).ok())
    } else if value == "." || value.starts_with("./") || value.starts_with('/') {
        (None, None)
    } else {
        (Some(value), None)
    }
}

impl GitConfigClient for Git {
    fn read_branch_config(&self, branch: &str) -> Result<BranchConfig, GitError> {
        let mut config = BranchConfig::default();

        if let Some(remote) = self.config_string(&format!("branch.{branch}.remote"))? {
            (config.remote_name, config.remote_url) = classify_remote_value(remote);
        }
        if let Some(push_remote) = self.config_string(&format!("branch.{branch}.pushremote"))? {
            (config.push_remote_name, config.push_remote_url) = classify_remote_value(push_remote);
        }
        config.merge_ref = self.config_string(&format!("branch.{branch}.merge"))?;
        config.merge_base = self.config_string(&format!("branch.{branch}.gh-merge-base"))?;

        Ok(config)
    }

    fn push_default(&self) -> Result<PushDefault, GitError> {
        match self.config_string("push.default")? {
            Some(value) => value.parse(),
            None => Ok(PushDefault::default()),
        }
    }

    fn remote_push_default(&self) -> Result<Option<String>, GitError> {
        Ok(self
            .config_string("remote.pushDefault")?
            .filter(|v| !v.is_empty()))
    }

    fn push_revision(&self, branch: &str) -> Result<RemoteTrackingRef, GitError> {
        let spec = format!("{branch}@{{push}}");
        let output = self
            .git_command()
            .args(["rev-parse", "--symbolic-full-name", &spec])
            .stderr(Stdio::null())
            .output()
            .map_err(|e| GitError::CommandFailed {
                command: "git rev-parse".into(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: "git rev-parse".into(),
                message: format!("could not resolve {spec}"),
            });
        }

        RemoteTrackingRef::parse(String::from_utf8_lossy(&output.stdout).trim())
    }
}

impl GitClient for Git {
    fn config_client(&self) -> &dyn GitConfigClient {
        self
    }

    fn current_branch(&self) -> Result<String, GitError> {
        self.with_repo(|repo| match repo.head() {
            Ok(head) if head.is_branch() => head
                .shorthand()
                .map(String::from)
                .ok_or(GitError::NotOnAnyBranch),
            Ok(_) => Err(GitError::NotOnAnyBranch),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head = repo.find_reference("HEAD")?;
                head.symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(String::from)
                    .ok_or(GitError::NotOnAnyBranch)
            }
            Err(e) => Err(e.into()),
        })
    }

    fn show_refs(&self, refs: &[String]) -> Result<Vec<ShowRef>, GitError> {
        self.with_repo(|repo| {
            let mut found = Vec::new();
            for name in refs {
                match repo.revparse_single(name) {
                    Ok(object) => {
                        let commit = object.peel_to_commit()?;
                        found.push(ShowRef {
                            hash: commit.id().to_string(),
                            name: name.clone(),
                        });
                    }
                    Err(e)
                        if matches!(
                            e.code(),
                            git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec
                        ) =>
                    {
                        debug!(refname = %name, "ref does not exist");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(found)
        })
    }

    fn remotes(&self) -> Result<Vec<GitRemote>, GitError> {
        let names: Vec<String> = self.with_repo(|repo| {
            Ok(repo.remotes()?.iter().flatten().map(String::from).collect())
        })?;

        let mut remotes = Vec::with_capacity(names.len());
        for name in names {
            let (fetch, push) = self.with_repo(|repo| {
                let remote = repo.find_remote(&name)?;
                Ok((
                    remote.url().map(String::from),
                    remote.pushurl().map(String::from),
                ))
            })?;
            let fetch_url = fetch.and_then(|u| parse_remote_url(&u).ok());
            let push_url = push
                .and_then(|u| parse_remote_url(&u).ok())
                .or_else(|| fetch_url.clone());
            let resolved = self.config_string(&format!("remote.{name}.gh-resolved"))?;

            remotes.push(GitRemote {
                name,
                fetch_url,
                push_url,
                resolved,
            });
        }
        Ok(remotes)
    }

    fn add_remote(
        &self,
        name: &str,
        url: &str,
        tracking_branches: &[String],
    ) -> Result<GitRemote, GitError> {
        self.with_repo(|repo| {
            match tracking_branches.split_first() {
                None => {
                    repo.remote(name, url)?;
                }
                Some((first, rest)) => {
                    let refspec = |b: &String| format!("+refs/heads/{b}:refs/remotes/{name}/{b}");
                    repo.remote_with_fetch(name, url, &refspec(first))?;
                    for branch in rest {
                        repo.remote_add_fetch(name, &refspec(branch))?;
                    }
                }
            }
            Ok(())
        })?;

        let parsed = parse_remote_url(url).ok();
        Ok(GitRemote {
            name: name.to_string(),
            fetch_url: parsed.clone(),
            push_url: parsed,
            resolved: None,
        })
    }

    fn rename_remote(&self, old: &str, new: &str) -> Result<(), GitError> {
        let output = self
            .git_command()
            .args(["remote", "rename", old, new])
            .output()
            .map_err(|e| GitError::CommandFailed {
                command: "git remote rename".into(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                command: "git remote rename".into(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn set_remote_resolution(&self, name: &str, resolution: &str) -> Result<(), GitError> {
        self.with_repo(|repo| {
            let mut config = repo.config()?;
            config.set_str(&format!("remote.{name}.gh-resolved"), resolution)?;
            Ok(())
        })
    }

    fn push(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        debug!(remote, refspec, "git push");
        let status = self
            .git_command()
            .args(["push", "--set-upstream", remote, refspec])
            .status()
            .map_err(|e| GitError::CommandFailed {
                command: "git push".into(),
                message: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                command: "git push".into(),
                message: format!("exit status {}", status.code().unwrap_or(-1)),
            })
        }
    }

    fn commits(&self, base_ref: &str, head_ref: &str) -> Result<Vec<Commit>, GitError> {
        self.with_repo(|repo| {
            let head = repo
                .revparse_single(head_ref)
                .map_err(|_| GitError::RefNotFound {
                    refname: head_ref.to_string(),
                })?
                .peel_to_commit()?;
            let base = repo
                .revparse_single(base_ref)
                .map_err(|_| GitError::RefNotFound {
                    refname: base_ref.to_string(),
                })?
                .peel_to_commit()?;

            let mut walk = repo.revwalk()?;
            walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
            walk.push(head.id())?;
            walk.hide(base.id())?;

            let mut commits = Vec::new();
            for oid in walk {
                let commit = repo.find_commit(oid?)?;
                let message = commit.message().unwrap_or("");
                let (title, body) = match message.split_once('\n') {
                    Some((title, body)) => (title.trim(), body.trim()),
                    None => (message.trim(), ""),
                };
                commits.push(Commit {
                    sha: commit.id().to_string(),
                    title: title.to_string(),
                    body: body.to_string(),
                });
            }
            if commits.is_empty() {
                return Err(GitError::NoCommits {
                    base: base_ref.to_string(),
                    head: head_ref.to_string(),
                });
            }
            Ok(commits)
        })
    }

    fn uncommitted_change_count(&self) -> Result<usize, GitError> {
        self.with_repo(|repo| {
            let mut opts = git2::StatusOptions::new();
            opts.include_untracked(true).include_ignored(false);
            Ok(repo.statuses(Some(&mut opts))?.len())
        })
    }

    fn repo_dir(&self) -> Result<PathBuf, GitError> {
        Ok(self.workdir.clone())
    }
}
