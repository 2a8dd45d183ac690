//! core::refs
//!
//! Pull request head and base ref resolution.
//!
//! # Design
//!
//! A pull request's head is identified by a [`QualifiedHeadRef`]: the branch
//! name, prefixed with the owner of the fork when the head lives in a
//! different repository than the base (`owner:branch`).
//!
//! Working out that head from a local branch is a fixed-precedence walk over
//! git configuration, implemented by [`try_determine_default_push_target`]:
//!
//! 1. `<branch>@{push}`, if it resolves (failure is not an error)
//! 2. `branch.<branch>.pushRemote`
//! 3. `remote.pushDefault`
//! 4. `branch.<branch>.remote`
//!
//! When none is set, the target has no remote and callers choose a
//! fallback. The branch name is the local name, unless
//! `push.default` is `upstream`/`tracking` and the branch merges from a
//! differently named branch.
//!
//! [`try_determine_default_pr_head`] turns the remote into a [`Repo`] and
//! [`PullRequestFindRefsResolver`] composes the refs used to look the pull
//! request up.
//!
//! # Example
//!
//! ```
//! use ghr::core::refs::QualifiedHeadRef;
//!
//! let head = QualifiedHeadRef::parse("monalisa:feature").unwrap();
//! assert_eq!(head.owner(), Some("monalisa"));
//! assert_eq!(head.branch(), "feature");
//! assert_eq!(head.to_string(), "monalisa:feature");
//! ```

use std::fmt;

use thiserror::Error;
use tracing::debug;
use url::Url;

use super::remotes::{RemoteError, Remotes};
use super::types::{Repo, RepoParseError};
use crate::git::{BranchConfig, GitConfigClient, GitError, PushDefault, RemoteTrackingRef};

/// Errors from ref resolution.
#[derive(Debug, Error)]
pub enum RefError {
    #[error("invalid qualified head ref format '{0}'")]
    InvalidQualifiedHeadRef(String),

    #[error("find pull request ref resolution cannot be performed without a base repository")]
    MissingBaseRepo,

    #[error("find pull request ref resolution cannot be performed without a local branch name")]
    MissingLocalBranch,

    #[error("could not resolve remote \"{name}\": {source}")]
    UnresolvedRemote { name: String, source: RemoteError },

    #[error("could not parse remote URL \"{url}\": {source}")]
    UnparseableRemoteUrl { url: String, source: RepoParseError },

    #[error(transparent)]
    Git(#[from] GitError),
}

/// A head branch, optionally qualified with the owner of its repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedHeadRef {
    owner: Option<String>,
    branch: String,
}

impl QualifiedHeadRef {
    /// Create a head ref. An empty owner is treated as no owner.
    pub fn new(owner: impl Into<String>, branch: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            owner: (!owner.is_empty()).then_some(owner),
            branch: branch.into(),
        }
    }

    pub fn without_owner(branch: impl Into<String>) -> Self {
        Self {
            owner: None,
            branch: branch.into(),
        }
    }

    /// Parse `<owner>:<branch>` or `<branch>`.
    ///
    /// No validation of the branch itself is done. More than one `:` is an
    /// error.
    pub fn parse(input: &str) -> Result<Self, RefError> {
        if !input.contains(':') {
            return Ok(Self::without_owner(input));
        }

        let parts: Vec<&str> = input.split(':').collect();
        match parts.as_slice() {
            [owner, branch] => Ok(Self::new(*owner, *branch)),
            _ => Err(RefError::InvalidQualifiedHeadRef(input.to_string())),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }
}

impl fmt::Display for QualifiedHeadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}:{}", owner, self.branch),
            None => f.write_str(&self.branch),
        }
    }
}

/// The remote of a push target: a configured remote name or a bare URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushRemote {
    Name(String),
    Url(Url),
}

impl fmt::Display for PushRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushRemote::Name(name) => f.write_str(name),
            PushRemote::Url(url) => f.write_str(url.as_str()),
        }
    }
}

/// Where a bare `git push` of a branch would most likely go.
///
/// The branch is always known; the remote may not be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPushTarget {
    pub remote: Option<PushRemote>,
    pub branch: String,
}

impl DefaultPushTarget {
    fn to(remote: PushRemote, branch: String) -> Self {
        Self {
            remote: Some(remote),
            branch,
        }
    }
}

/// Best guess at where `local_branch` is pushed.
///
/// Only a failing `@{push}` lookup is tolerated; every other git error
/// is returned.
pub fn try_determine_default_push_target(
    git: &dyn GitConfigClient,
    local_branch: &str,
) -> Result<DefaultPushTarget, RefError> {
    if let Ok(RemoteTrackingRef { remote, branch }) = git.push_revision(local_branch) {
        debug!(%remote, %branch, "push target from @{{push}}");
        return Ok(DefaultPushTarget::to(PushRemote::Name(remote), branch));
    }

    let config = git.read_branch_config(local_branch)?;
    let push_default = git.push_default()?;

    let mut remote_branch = local_branch.to_string();
    if matches!(push_default, PushDefault::Upstream | PushDefault::Tracking) {
        let merge = config
            .merge_ref
            .as_deref()
            .map(|r| r.strip_prefix("refs/heads/").unwrap_or(r))
            .unwrap_or("");
        if !merge.is_empty() {
            remote_branch = merge.to_string();
        }
    }

    if let Some(name) = config.push_remote_name {
        return Ok(DefaultPushTarget::to(PushRemote::Name(name), remote_branch));
    }
    if let Some(url) = config.push_remote_url {
        return Ok(DefaultPushTarget::to(PushRemote::Url(url), remote_branch));
    }

    if let Some(name) = git.remote_push_default()? {
        return Ok(DefaultPushTarget::to(PushRemote::Name(name), remote_branch));
    }

    if let Some(name) = config.remote_name {
        return Ok(DefaultPushTarget::to(PushRemote::Name(name), remote_branch));
    }
    if let Some(url) = config.remote_url {
        return Ok(DefaultPushTarget::to(PushRemote::Url(url), remote_branch));
    }

    debug!(branch = %remote_branch, "no push remote configured");
    Ok(DefaultPushTarget {
        remote: None,
        branch: remote_branch,
    })
}

/// Resolves a push remote to the repository it points at.
pub trait RemoteResolver {
    fn resolve(&self, remote: &PushRemote) -> Result<Repo, RefError>;
}

/// Resolves remote names against the local remotes and parses URLs.
#[derive(Debug, Clone, Copy)]
pub struct RemoteToRepoResolver<'a> {
    remotes: &'a Remotes,
}

impl<'a> RemoteToRepoResolver<'a> {
    pub fn new(remotes: &'a Remotes) -> Self {
        Self { remotes }
    }
}

impl RemoteResolver for RemoteToRepoResolver<'_> {
    fn resolve(&self, remote: &PushRemote) -> Result<Repo, RefError> {
        match remote {
            PushRemote::Name(name) => self
                .remotes
                .find_by_name(&[name.as_str()])
                .map(|r| r.repo.clone())
                .map_err(|source| RefError::UnresolvedRemote {
                    name: name.clone(),
                    source,
                }),
            PushRemote::Url(url) => {
                Repo::from_parsed_url(url).map_err(|source| RefError::UnparseableRemoteUrl {
                    url: url.to_string(),
                    source,
                })
            }
        }
    }
}

/// A push target resolved to a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPrHead {
    /// Absent when no remote could be determined.
    pub repo: Option<Repo>,
    pub branch: String,
}

/// Resolve the default push target of `branch` to a repository.
pub fn try_determine_default_pr_head(
    git: &dyn GitConfigClient,
    resolver: &dyn RemoteResolver,
    branch: &str,
) -> Result<DefaultPrHead, RefError> {
    let target = try_determine_default_push_target(git, branch)?;

    let repo = match &target.remote {
        Some(remote) => Some(resolver.resolve(remote)?),
        None => None,
    };

    Ok(DefaultPrHead {
        repo,
        branch: target.branch,
    })
}

/// Everything needed to find a pull request by its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrFindRefs {
    qualified_head_ref: QualifiedHeadRef,
    base_repo: Repo,
    base_branch: Option<String>,
}

impl PrFindRefs {
    pub fn new(
        qualified_head_ref: QualifiedHeadRef,
        base_repo: Repo,
        base_branch: Option<String>,
    ) -> Self {
        Self {
            qualified_head_ref,
            base_repo,
            base_branch: base_branch.filter(|b| !b.is_empty()),
        }
    }

    /// `owner:branch` for cross-repository heads, `branch` otherwise.
    pub fn qualified_head_ref(&self) -> String {
        self.qualified_head_ref.to_string()
    }

    pub fn unqualified_head_ref(&self) -> &str {
        self.qualified_head_ref.branch()
    }

    pub fn base_repo(&self) -> &Repo {
        &self.base_repo
    }

    pub fn base_branch(&self) -> Option<&str> {
        self.base_branch.as_deref()
    }

    /// Whether a pull request with these refs is the one being looked for.
    ///
    /// The head must match exactly; the base only when one was requested.
    pub fn matches(&self, base_branch: &str, qualified_head_ref: &str) -> bool {
        let head_matches = qualified_head_ref == self.qualified_head_ref();
        let base_matches = self
            .base_branch
            .as_deref()
            .map_or(true, |b| b == base_branch);
        head_matches && base_matches
    }
}

/// Derives [`PrFindRefs`] for a local branch from git configuration.
pub struct PullRequestFindRefsResolver<'a> {
    git: &'a dyn GitConfigClient,
    resolver: &'a dyn RemoteResolver,
}

impl<'a> PullRequestFindRefsResolver<'a> {
    pub fn new(git: &'a dyn GitConfigClient, resolver: &'a dyn RemoteResolver) -> Self {
        Self { git, resolver }
    }

    /// Resolve the refs for `local_branch`.
    ///
    /// When git does not say where the branch is pushed, the head is
    /// assumed to live in the base repository.
    pub fn resolve(
        &self,
        base_repo: Option<&Repo>,
        base_branch: &str,
        local_branch: &str,
    ) -> Result<PrFindRefs, RefError> {
        let base_repo = base_repo.ok_or(RefError::MissingBaseRepo)?;
        if local_branch.is_empty() {
            return Err(RefError::MissingLocalBranch);
        }

        let head = try_determine_default_pr_head(self.git, self.resolver, local_branch)?;
        let base_branch = Some(base_branch.to_string());

        let qualified_head_ref = match head.repo {
            Some(head_repo) if !head_repo.is_same(base_repo) => {
                QualifiedHeadRef::new(head_repo.owner(), head.branch)
            }
            _ => QualifiedHeadRef::without_owner(head.branch),
        };

        Ok(PrFindRefs::new(
            qualified_head_ref,
            base_repo.clone(),
            base_branch,
        ))
    }
}

/// A [`GitConfigClient`] that answers branch configuration from a value
/// read earlier, delegating everything else.
pub struct CachedBranchConfigGitConfigClient<'a> {
    inner: &'a dyn GitConfigClient,
    branch_config: BranchConfig,
}

impl<'a> CachedBranchConfigGitConfigClient<'a> {
    pub fn new(inner: &'a dyn GitConfigClient, branch_config: BranchConfig) -> Self {
        Self {
            inner,
            branch_config,
        }
    }
}

impl GitConfigClient for CachedBranchConfigGitConfigClient<'_> {
    fn read_branch_config(&self, _branch: &str) -> Result<BranchConfig, GitError> {
        Ok(self.branch_config.clone())
    }

    fn push_default(&self) -> Result<PushDefault, GitError> {
        self.inner.push_default()
    }

    fn remote_push_default(&self) -> Result<Option<String>, GitError> {
        self.inner.remote_push_default()
    }

    fn push_revision(&self, branch: &str) -> Result<RemoteTrackingRef, GitError> {
        self.inner.push_revision(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::remotes::Remote;
    use crate::git::stub::{GitOperation, StubGitClient};

    fn remotes() -> Remotes {
        Remotes::new(vec![
            Remote::new("origin", Repo::new("octo", "hello")),
            Remote::new("fork", Repo::new("monalisa", "hello")),
        ])
    }

    fn tracking(remote: &str, branch: &str) -> RemoteTrackingRef {
        RemoteTrackingRef {
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    mod qualified_head_ref {
        use super::*;

        #[test]
        fn branch_only() {
            let r = QualifiedHeadRef::parse("feature-branch").unwrap();
            assert_eq!(r.owner(), None);
            assert_eq!(r.to_string(), "feature-branch");
        }

        #[test]
        fn owner_and_branch() {
            let r = QualifiedHeadRef::parse("owner:feature-branch").unwrap();
            assert_eq!(r.owner(), Some("owner"));
            assert_eq!(r.branch(), "feature-branch");
        }

        #[test]
        fn extra_colon_is_error() {
            let err = QualifiedHeadRef::parse("owner:feature-branch:extra").unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid qualified head ref format 'owner:feature-branch:extra'"
            );
        }

        #[test]
        fn empty_owner_is_none() {
            let r = QualifiedHeadRef::parse(":feature").unwrap();
            assert_eq!(r.owner(), None);
            assert_eq!(r.to_string(), "feature");
        }
    }

    mod push_target {
        use super::*;

        #[test]
        fn push_revision_wins() {
            let git = StubGitClient::new()
                .with_push_revision("feature", tracking("origin", "remote-feature"))
                .with_remote_push_default("fork")
                .with_branch_config_error("must not be read");

            let target = try_determine_default_push_target(&git, "feature").unwrap();
            assert_eq!(target.remote, Some(PushRemote::Name("origin".into())));
            assert_eq!(target.branch, "remote-feature");
            assert_eq!(
                git.operations(),
                vec![GitOperation::PushRevision {
                    branch: "feature".into()
                }]
            );
        }

        #[test]
        fn branch_push_remote_before_remote_push_default() {
            let git = StubGitClient::new()
                .with_branch_config(
                    "feature",
                    BranchConfig {
                        push_remote_name: Some("fork".into()),
                        remote_name: Some("origin".into()),
                        ..Default::default()
                    },
                )
                .with_remote_push_default("upstream");

            let target = try_determine_default_push_target(&git, "feature").unwrap();
            assert_eq!(target.remote, Some(PushRemote::Name("fork".into())));
            assert!(!git.operations().contains(&GitOperation::RemotePushDefault));
        }

        #[test]
        fn push_remote_url() {
            let url = Url::parse("https://github.com/monalisa/hello.git").unwrap();
            let git = StubGitClient::new().with_branch_config(
                "feature",
                BranchConfig {
                    push_remote_url: Some(url.clone()),
                    ..Default::default()
                },
            );

            let target = try_determine_default_push_target(&git, "feature").unwrap();
            assert_eq!(target.remote, Some(PushRemote::Url(url)));
        }

        #[test]
        fn remote_push_default_before_branch_remote() {
            let git = StubGitClient::new()
                .with_branch_config(
                    "feature",
                    BranchConfig {
                        remote_name: Some("origin".into()),
                        ..Default::default()
                    },
                )
                .with_remote_push_default("fork");

            let target = try_determine_default_push_target(&git, "feature").unwrap();
            assert_eq!(target.remote, Some(PushRemote::Name("fork".into())));
        }

        #[test]
        fn branch_remote_with_default_push_default() {
            let git = StubGitClient::new().with_branch_config(
                "feature",
                BranchConfig {
                    remote_name: Some("origin".into()),
                    merge_ref: Some("refs/heads/main".into()),
                    ..Default::default()
                },
            );

            let target = try_determine_default_push_target(&git, "feature").unwrap();
            assert_eq!(target.remote, Some(PushRemote::Name("origin".into())));
            assert_eq!(target.branch, "feature");
        }

        #[test]
        fn upstream_push_default_uses_merge_ref() {
            let git = StubGitClient::new()
                .with_push_default(PushDefault::Upstream)
                .with_branch_config(
                    "feature",
                    BranchConfig {
                        remote_name: Some("origin".into()),
                        merge_ref: Some("refs/heads/main".into()),
                        ..Default::default()
                    },
                );

            let target = try_determine_default_push_target(&git, "feature").unwrap();
            assert_eq!(target.branch, "main");
        }

        #[test]
        fn tracking_push_default_without_merge_ref_keeps_local_name() {
            let git = StubGitClient::new().with_push_default(PushDefault::Tracking);

            let target = try_determine_default_push_target(&git, "feature").unwrap();
            assert_eq!(target.remote, None);
            assert_eq!(target.branch, "feature");
        }

        #[test]
        fn config_errors_propagate() {
            let git = StubGitClient::new().with_branch_config_error("boom");
            assert!(try_determine_default_push_target(&git, "feature").is_err());

            let git = StubGitClient::new().with_push_default_error("boom");
            assert!(try_determine_default_push_target(&git, "feature").is_err());

            let git = StubGitClient::new().with_remote_push_default_error("boom");
            assert!(try_determine_default_push_target(&git, "feature").is_err());
        }
    }

    mod pr_head {
        use super::*;

        #[test]
        fn resolves_push_revision_remote() {
            let remotes = remotes();
            let resolver = RemoteToRepoResolver::new(&remotes);
            let git = StubGitClient::new()
                .with_push_revision("feature-branch", tracking("origin", "feature-branch"));

            let head = try_determine_default_pr_head(&git, &resolver, "feature-branch").unwrap();
            assert_eq!(head.repo, Some(Repo::new("octo", "hello")));
            assert_eq!(head.branch, "feature-branch");
        }

        #[test]
        fn unknown_remote_name_is_error() {
            let remotes = remotes();
            let resolver = RemoteToRepoResolver::new(&remotes);
            let git = StubGitClient::new().with_push_revision("f", tracking("missing", "f"));

            let err = try_determine_default_pr_head(&git, &resolver, "f").unwrap_err();
            assert_eq!(
                err.to_string(),
                "could not resolve remote \"missing\": no matching remote found"
            );
        }

        #[test]
        fn no_remote_means_no_repo() {
            let remotes = remotes();
            let resolver = RemoteToRepoResolver::new(&remotes);
            let git = StubGitClient::new();

            let head = try_determine_default_pr_head(&git, &resolver, "f").unwrap();
            assert_eq!(head.repo, None);
            assert_eq!(head.branch, "f");
        }
    }

    mod find_refs {
        use super::*;

        #[test]
        fn matches_head_and_optional_base() {
            let refs = PrFindRefs::new(
                QualifiedHeadRef::new("monalisa", "feature"),
                Repo::new("octo", "hello"),
                None,
            );
            assert!(refs.matches("anything", "monalisa:feature"));
            assert!(!refs.matches("main", "feature"));

            let refs = PrFindRefs::new(
                QualifiedHeadRef::without_owner("feature"),
                Repo::new("octo", "hello"),
                Some("main".into()),
            );
            assert!(refs.matches("main", "feature"));
            assert!(!refs.matches("develop", "feature"));
        }

        #[test]
        fn requires_base_repo_and_branch() {
            let git = StubGitClient::new();
            let remotes = remotes();
            let resolver = RemoteToRepoResolver::new(&remotes);
            let finder = PullRequestFindRefsResolver::new(&git, &resolver);

            assert!(matches!(
                finder.resolve(None, "", "feature"),
                Err(RefError::MissingBaseRepo)
            ));
            assert!(matches!(
                finder.resolve(Some(&Repo::new("octo", "hello")), "", ""),
                Err(RefError::MissingLocalBranch)
            ));
        }

        #[test]
        fn cross_repository_head_is_qualified() {
            let git = StubGitClient::new()
                .with_push_revision("feature", tracking("fork", "feature"));
            let remotes = remotes();
            let resolver = RemoteToRepoResolver::new(&remotes);
            let finder = PullRequestFindRefsResolver::new(&git, &resolver);

            let refs = finder
                .resolve(Some(&Repo::new("octo", "hello")), "main", "feature")
                .unwrap();
            assert_eq!(refs.qualified_head_ref(), "monalisa:feature");
            assert_eq!(refs.unqualified_head_ref(), "feature");
            assert_eq!(refs.base_branch(), Some("main"));
        }

        #[test]
        fn same_repository_head_is_unqualified() {
            let git = StubGitClient::new()
                .with_push_revision("feature", tracking("origin", "feature"));
            let remotes = remotes();
            let resolver = RemoteToRepoResolver::new(&remotes);
            let finder = PullRequestFindRefsResolver::new(&git, &resolver);

            let refs = finder
                .resolve(Some(&Repo::new("OCTO", "hello")), "", "feature")
                .unwrap();
            assert_eq!(refs.qualified_head_ref(), "feature");
            assert_eq!(refs.base_branch(), None);
        }

        #[test]
        fn defaults_to_base_repo() {
            let git = StubGitClient::new();
            let remotes = remotes();
            let resolver = RemoteToRepoResolver::new(&remotes);
            let finder = PullRequestFindRefsResolver::new(&git, &resolver);

            let refs = finder
                .resolve(Some(&Repo::new("octo", "hello")), "main", "feature")
                .unwrap();
            assert_eq!(refs.qualified_head_ref(), "feature");
            assert_eq!(refs.base_repo(), &Repo::new("octo", "hello"));
        }
    }

    mod cached_config {
        use super::*;

        #[test]
        fn serves_cached_branch_config() {
            let git = StubGitClient::new().with_branch_config_error("must not be read");
            let cached = CachedBranchConfigGitConfigClient::new(
                &git,
                BranchConfig {
                    remote_name: Some("origin".into()),
                    ..Default::default()
                },
            );

            let target = try_determine_default_push_target(&cached, "feature").unwrap();
            assert_eq!(target.remote, Some(PushRemote::Name("origin".into())));
        }
    }
}
