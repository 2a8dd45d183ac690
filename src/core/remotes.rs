//! core::remotes
//!
//! Git remotes resolved to forge repositories.
//!
//! # Ordering
//!
//! Remotes are sorted so that `upstream` comes first, then `github`, then
//! `origin`, then everything else in configuration order. Lookups that
//! accept several candidates return the first match in this order, which
//! makes `upstream` the natural base repository in a fork checkout.

use thiserror::Error;
use url::Url;

use super::types::Repo;
use crate::git::GitRemote;

/// Errors from remote lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("no matching remote found")]
    NoMatchingName,

    #[error("no matching remote found; looking for {owner}/{name}")]
    NoMatchingRepo { owner: String, name: String },

    #[error("no git remotes found")]
    NoRemotes,
}

/// A git remote pointing at a forge repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub fetch_url: Option<Url>,
    pub push_url: Option<Url>,
    pub repo: Repo,
    /// `remote.<name>.gh-resolved`, when set.
    pub resolved: Option<String>,
}

impl Remote {
    pub fn new(name: impl Into<String>, repo: Repo) -> Self {
        Self {
            name: name.into(),
            fetch_url: None,
            push_url: None,
            repo,
            resolved: None,
        }
    }
}

fn priority(name: &str) -> u8 {
    match name {
        "upstream" => 3,
        "github" => 2,
        "origin" => 1,
        _ => 0,
    }
}

/// Sorted list of remotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remotes(Vec<Remote>);

impl Remotes {
    pub fn new(mut remotes: Vec<Remote>) -> Self {
        remotes.sort_by_key(|r| std::cmp::Reverse(priority(&r.name)));
        Self(remotes)
    }

    /// Translate raw git remotes, dropping those whose URL is not a repository.
    pub fn from_git(remotes: Vec<GitRemote>) -> Self {
        let translated = remotes
            .into_iter()
            .filter_map(|raw| {
                let url = raw.fetch_url.as_ref().or(raw.push_url.as_ref())?;
                let repo = Repo::from_parsed_url(url).ok()?;
                Some(Remote {
                    name: raw.name,
                    fetch_url: raw.fetch_url,
                    push_url: raw.push_url,
                    repo,
                    resolved: raw.resolved,
                })
            })
            .collect();
        Self::new(translated)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Remote> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First remote whose name matches any of `names`; `*` matches all.
    pub fn find_by_name(&self, names: &[&str]) -> Result<&Remote, RemoteError> {
        names
            .iter()
            .find_map(|wanted| {
                self.0
                    .iter()
                    .find(|r| *wanted == "*" || r.name == *wanted)
            })
            .ok_or(RemoteError::NoMatchingName)
    }

    /// Remote pointing at `owner/name`, compared case-insensitively.
    pub fn find_by_repo(&self, owner: &str, name: &str) -> Result<&Remote, RemoteError> {
        self.0
            .iter()
            .find(|r| {
                r.repo.owner().eq_ignore_ascii_case(owner)
                    && r.repo.name().eq_ignore_ascii_case(name)
            })
            .ok_or_else(|| RemoteError::NoMatchingRepo {
                owner: owner.to_string(),
                name: name.to_string(),
            })
    }

    /// Whether a remote with this exact name exists.
    pub fn contains_name(&self, name: &str) -> bool {
        self.0.iter().any(|r| r.name == name)
    }

    /// Pick the base repository.
    ///
    /// An explicit override wins. Otherwise a remote marked with
    /// `gh-resolved = base` (or `gh-resolved = OWNER/REPO`) is used, falling
    /// back to the highest-priority remote.
    pub fn resolve_base_repo(&self, repo_override: Option<&Repo>) -> Result<Repo, RemoteError> {
        if let Some(repo) = repo_override {
            return Ok(repo.clone());
        }

        for remote in &self.0 {
            match remote.resolved.as_deref() {
                Some("base") => return Ok(remote.repo.clone()),
                Some(full_name) if full_name.contains('/') => {
                    if let Ok(repo) = Repo::from_full_name(full_name, remote.repo.host()) {
                        return Ok(repo);
                    }
                }
                _ => {}
            }
        }

        self.0
            .first()
            .map(|r| r.repo.clone())
            .ok_or(RemoteError::NoRemotes)
    }
}

impl<'a> IntoIterator for &'a Remotes {
    type Item = &'a Remote;
    type IntoIter = std::slice::Iter<'a, Remote>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remotes() -> Remotes {
        Remotes::new(vec![
            Remote::new("mona", Repo::new("monalisa", "hello")),
            Remote::new("origin", Repo::new("me", "hello")),
            Remote::new("upstream", Repo::new("octo", "hello")),
        ])
    }

    mod ordering {
        use super::*;

        #[test]
        fn upstream_first_then_origin() {
            let all = remotes();
            let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["upstream", "origin", "mona"]);
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn find_by_name() {
            let r = remotes();
            assert_eq!(r.find_by_name(&["origin"]).unwrap().name, "origin");
            assert_eq!(r.find_by_name(&["*"]).unwrap().name, "upstream");
            assert_eq!(
                r.find_by_name(&["nope"]).unwrap_err(),
                RemoteError::NoMatchingName
            );
        }

        #[test]
        fn find_by_repo_is_case_insensitive() {
            let r = remotes();
            assert_eq!(r.find_by_repo("MONALISA", "Hello").unwrap().name, "mona");
            assert_eq!(
                r.find_by_repo("x", "y").unwrap_err().to_string(),
                "no matching remote found; looking for x/y"
            );
        }

        #[test]
        fn from_git_drops_unparseable_urls() {
            let raw = vec![
                GitRemote {
                    name: "origin".into(),
                    fetch_url: Url::parse("https://github.com/me/hello.git").ok(),
                    push_url: None,
                    resolved: None,
                },
                GitRemote {
                    name: "local".into(),
                    fetch_url: Url::parse("file:///srv/repo").ok(),
                    push_url: None,
                    resolved: None,
                },
            ];
            let r = Remotes::from_git(raw);
            assert_eq!(r.len(), 1);
            assert_eq!(r.find_by_name(&["origin"]).unwrap().repo.full_name(), "me/hello");
        }
    }

    mod base_repo {
        use super::*;

        #[test]
        fn override_wins() {
            let repo = Repo::new("x", "y");
            assert_eq!(remotes().resolve_base_repo(Some(&repo)).unwrap(), repo);
        }

        #[test]
        fn resolved_remote_preferred() {
            let mut list = vec![
                Remote::new("origin", Repo::new("me", "hello")),
                Remote::new("upstream", Repo::new("octo", "hello")),
            ];
            list[0].resolved = Some("base".into());
            let r = Remotes::new(list);
            assert_eq!(r.resolve_base_repo(None).unwrap().owner(), "me");
        }

        #[test]
        fn first_remote_by_default() {
            assert_eq!(remotes().resolve_base_repo(None).unwrap().owner(), "octo");
        }

        #[test]
        fn empty_is_error() {
            assert_eq!(
                Remotes::default().resolve_base_repo(None).unwrap_err(),
                RemoteError::NoRemotes
            );
        }
    }
}
