//! pr::finder
//!
//! Locating the pull request a command operates on.
//!
//! # Selectors
//!
//! Commands accept a pull request as:
//! - a URL, `https://<host>/<owner>/<repo>/pull/<number>` (the repository
//!   comes from the URL, not from the local remotes)
//! - a number, with or without a leading `#`
//! - a head branch, optionally qualified with the fork owner (`owner:branch`)
//! - nothing, meaning "the pull request for the current branch"
//!
//! A number is only treated as a number when no base branch is requested;
//! with a base branch it names a head branch.
//!
//! For the current branch, a checked-out pull request (merge ref
//! `refs/pull/<n>/head`) is recognised first. Otherwise the head is worked
//! out from git configuration with
//! [`PullRequestFindRefsResolver`](crate::core::refs::PullRequestFindRefsResolver).
//!
//! # Preloading
//!
//! Lists on the pull request (reviews, comments, closing issues, status
//! checks) come back one page at a time. When a requested list has more
//! pages, the rest are fetched after the pull request is found. The lists
//! are independent, so their pages are fetched concurrently; the first
//! error wins.
//!
//! # Example
//!
//! ```ignore
//! use ghr::pr::finder::{FindOptions, Finder, PrFinder};
//!
//! let finder = Finder::new(git, forge, None);
//! let (pr, repo) = finder
//!     .find(FindOptions::new("123", &["title", "url"]))
//!     .await?;
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::core::refs::{
    CachedBranchConfigGitConfigClient, PrFindRefs, PullRequestFindRefsResolver, QualifiedHeadRef,
    RefError, RemoteToRepoResolver,
};
use crate::core::remotes::{RemoteError, Remotes};
use crate::core::types::Repo;
use crate::forge::{Connection, Forge, ForgeError, PrState, PullRequest};
use crate::git::{GitClient, GitError};

/// Fields the branch lookup needs to filter candidates.
const BRANCH_FILTER_FIELDS: &[&str] = &[
    "state",
    "baseRefName",
    "headRefName",
    "isCrossRepository",
    "headRepositoryOwner",
];

/// No pull request matched the selector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct NotFoundError {
    message: String,
}

impl NotFoundError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// No pull request for the given head.
    pub fn for_branch(qualified_head_ref: &str) -> Self {
        Self::new(format!(
            "no pull requests found for branch \"{qualified_head_ref}\""
        ))
    }
}

/// Errors from finding a pull request.
#[derive(Debug, Error)]
pub enum FindError {
    #[error("Find error: no fields specified")]
    NoFields,

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// A test double was asked something it was not set up for.
    #[error("{0}")]
    Unexpected(String),
}

impl FindError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FindError::NotFound(_))
    }
}

/// What to look for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// URL, number, branch, or empty for the current branch.
    pub selector: String,
    /// GraphQL field names to fetch.
    pub fields: Vec<String>,
    /// Only match pull requests into this branch.
    pub base_branch: Option<String>,
    /// Restrict the branch lookup to these states; empty means any.
    pub states: Vec<PrState>,
}

impl FindOptions {
    pub fn new(selector: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            selector: selector.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_base_branch(mut self, base_branch: impl Into<String>) -> Self {
        self.base_branch = Some(base_branch.into()).filter(|b: &String| !b.is_empty());
        self
    }

    pub fn with_states(mut self, states: &[PrState]) -> Self {
        self.states = states.to_vec();
        self
    }
}

/// Finds pull requests. Injected into commands so tests can substitute
/// [`StubFinder`].
#[async_trait]
pub trait PrFinder: Send + Sync {
    /// The pull request and the repository it belongs to.
    async fn find(&self, opts: FindOptions) -> Result<(PullRequest, Repo), FindError>;
}

/// Parse a pull request URL into its repository and number.
///
/// Only `http` and `https` URLs whose path starts with
/// `/<owner>/<repo>/pull/<number>` qualify; anything may follow the number.
pub fn parse_pr_url(input: &str) -> Option<(Repo, u64)> {
    if input.is_empty() {
        return None;
    }
    let url = Url::parse(input).ok()?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return None;
    }

    let re = Regex::new(r"^/([^/]+)/([^/]+)/pull/(\d+)").ok()?;
    let caps = re.captures(url.path())?;
    let number = caps[3].parse().ok()?;
    let host = url.host_str()?;
    Some((Repo::with_host(host, &caps[1], &caps[2]), number))
}

/// Pull request number of a checked-out pull request branch.
fn checked_out_pr_number(merge_ref: &str) -> Option<u64> {
    merge_ref
        .strip_prefix("refs/pull/")?
        .strip_suffix("/head")?
        .parse()
        .ok()
        .filter(|n| *n > 0)
}

/// Add each of `extra` to `fields` unless already present.
fn with_fields(fields: &[String], extra: &[&str]) -> Vec<String> {
    let mut all = fields.to_vec();
    for field in extra {
        if !all.iter().any(|f| f == field) {
            all.push(field.to_string());
        }
    }
    all
}

/// Outcome of interpreting a selector against local state.
#[derive(Debug)]
struct Selection {
    base_repo: Repo,
    number: Option<u64>,
    refs: Option<PrFindRefs>,
}

/// Finder backed by the local repository and a forge.
pub struct Finder {
    git: Arc<dyn GitClient>,
    forge: Arc<dyn Forge>,
    repo_override: Option<Repo>,
}

impl Finder {
    /// `repo_override` replaces the base repository inferred from remotes.
    pub fn new(git: Arc<dyn GitClient>, forge: Arc<dyn Forge>, repo_override: Option<Repo>) -> Self {
        Self {
            git,
            forge,
            repo_override,
        }
    }

    fn base_repo(&self) -> Result<Repo, FindError> {
        let remotes = Remotes::from_git(self.git.remotes()?);
        Ok(remotes.resolve_base_repo(self.repo_override.as_ref())?)
    }

    /// Work out what to ask the forge for. Runs before any network call.
    fn resolve_selector(&self, opts: &FindOptions) -> Result<Selection, FindError> {
        let (base_repo, mut number) = match parse_pr_url(&opts.selector) {
            Some((repo, number)) => (repo, Some(number)),
            None => (self.base_repo()?, None),
        };
        let base_branch = opts.base_branch.as_deref().filter(|b| !b.is_empty());
        let mut refs = None;

        if opts.selector.is_empty() {
            let branch = self.git.current_branch()?;
            let config = self.git.read_branch_config(&branch)?;

            number = config.merge_ref.as_deref().and_then(checked_out_pr_number);
            if number.is_none() {
                let remotes = Remotes::from_git(self.git.remotes()?);
                let resolver = RemoteToRepoResolver::new(&remotes);
                let cached = CachedBranchConfigGitConfigClient::new(self.git.config_client(), config);
                refs = Some(PullRequestFindRefsResolver::new(&cached, &resolver).resolve(
                    Some(&base_repo),
                    base_branch.unwrap_or(""),
                    &branch,
                )?);
            }
        } else if number.is_none() {
            let trimmed = opts.selector.strip_prefix('#').unwrap_or(&opts.selector);
            match trimmed.parse::<u64>() {
                Ok(n) if base_branch.is_none() => number = (n > 0).then_some(n),
                _ => {
                    let head = QualifiedHeadRef::parse(&opts.selector)?;
                    refs = Some(PrFindRefs::new(
                        head,
                        base_repo.clone(),
                        base_branch.map(str::to_string),
                    ));
                }
            }
        }

        Ok(Selection {
            base_repo,
            number,
            refs,
        })
    }

    async fn find_for_refs(
        &self,
        refs: &PrFindRefs,
        states: &[PrState],
        fields: &[String],
    ) -> Result<PullRequest, FindError> {
        let fields = with_fields(fields, BRANCH_FILTER_FIELDS);
        let found = self
            .forge
            .pull_requests_for_branch(refs.base_repo(), refs.unqualified_head_ref(), states, &fields)
            .await?;

        let mut candidates = found.pull_requests;
        candidates.sort_by_key(|pr| pr.state != PrState::Open);

        let qualified = refs.qualified_head_ref();
        candidates
            .into_iter()
            .find(|pr| {
                let not_stale_default = pr.state == PrState::Open || found.default_branch != qualified;
                refs.matches(&pr.base_ref_name, &pr.head_label()) && not_stale_default
            })
            .ok_or_else(|| NotFoundError::for_branch(&qualified).into())
    }

    async fn preload(
        &self,
        repo: &Repo,
        pr: &mut PullRequest,
        fields: &[String],
    ) -> Result<(), ForgeError> {
        let wants = |name: &str| fields.iter().any(|f| f == name);
        let (want_reviews, want_comments, want_issues, want_checks) = (
            wants("reviews"),
            wants("comments"),
            wants("closingIssuesReferences"),
            wants("statusCheckRollup"),
        );

        let forge = self.forge.as_ref();
        let number = pr.number;
        let PullRequest {
            reviews,
            comments,
            closing_issues_references,
            status_checks,
            ..
        } = pr;

        futures::try_join!(
            async {
                if !want_reviews {
                    return Ok(());
                }
                fetch_remaining_pages(reviews, |after| {
                    forge.pull_request_reviews(repo, number, after)
                })
                .await
            },
            async {
                if !want_comments {
                    return Ok(());
                }
                fetch_remaining_pages(comments, |after| {
                    forge.pull_request_comments(repo, number, after)
                })
                .await
            },
            async {
                if !want_issues {
                    return Ok(());
                }
                fetch_remaining_pages(closing_issues_references, |after| {
                    forge.pull_request_closing_issues(repo, number, after)
                })
                .await
            },
            async {
                if !want_checks {
                    return Ok(());
                }
                fetch_remaining_pages(status_checks, |after| {
                    forge.pull_request_status_checks(repo, number, after)
                })
                .await
            },
        )?;
        Ok(())
    }
}

/// Append every page after the first to `list`.
async fn fetch_remaining_pages<T, F, Fut>(
    list: &mut Connection<T>,
    mut fetch: F,
) -> Result<(), ForgeError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Connection<T>, ForgeError>>,
{
    if !list.page_info.has_next_page {
        return Ok(());
    }

    let mut cursor = list.page_info.end_cursor.clone();
    loop {
        let page = fetch(cursor.take()).await?;
        list.nodes.extend(page.nodes);
        list.total_count = list.nodes.len() as u64;
        if !page.page_info.has_next_page {
            break;
        }
        cursor = page.page_info.end_cursor;
    }

    list.page_info.has_next_page = false;
    Ok(())
}

#[async_trait]
impl PrFinder for Finder {
    async fn find(&self, opts: FindOptions) -> Result<(PullRequest, Repo), FindError> {
        if opts.fields.is_empty() {
            return Err(FindError::NoFields);
        }

        let Selection {
            base_repo,
            number,
            refs,
        } = self.resolve_selector(&opts)?;

        let number_only = opts.fields.iter().all(|f| f == "number");
        let fields = with_fields(&opts.fields, &["id", "number"]);

        let mut pr = match (number, &refs) {
            (Some(number), _) => {
                if number_only {
                    debug!(number, "number-only lookup, skipping API");
                    return Ok((
                        PullRequest {
                            number,
                            ..Default::default()
                        },
                        base_repo,
                    ));
                }
                debug!(repo = %base_repo, number, "finding pull request by number");
                self.forge
                    .pull_request_by_number(&base_repo, number, &fields)
                    .await?
            }
            (None, Some(refs)) => {
                debug!(
                    repo = %refs.base_repo(),
                    head = %refs.qualified_head_ref(),
                    base = ?refs.base_branch(),
                    "finding pull request by head branch"
                );
                self.find_for_refs(refs, &opts.states, &fields).await?
            }
            (None, None) => return Err(NotFoundError::new("no pull requests found").into()),
        };

        self.preload(&base_repo, &mut pr, &fields).await?;
        Ok((pr, base_repo))
    }
}

/// A recorded [`StubFinder`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindCall {
    pub selector: String,
    pub fields: Vec<String>,
    pub base_branch: Option<String>,
}

/// Finder returning a fixed result, for command tests.
///
/// When constructed with an expected selector, any other selector is an
/// error. Without a pull request every lookup is "not found".
#[derive(Debug, Default)]
pub struct StubFinder {
    expected_selector: Option<String>,
    result: Option<(PullRequest, Repo)>,
    calls: Mutex<Vec<FindCall>>,
}

impl StubFinder {
    pub fn new(expected_selector: &str, pr: PullRequest, repo: Repo) -> Self {
        Self {
            expected_selector: Some(expected_selector.to_string()),
            result: Some((pr, repo)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A finder that never finds anything.
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<FindCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PrFinder for StubFinder {
    async fn find(&self, opts: FindOptions) -> Result<(PullRequest, Repo), FindError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FindCall {
                selector: opts.selector.clone(),
                fields: opts.fields.clone(),
                base_branch: opts.base_branch.clone(),
            });

        if let Some(expected) = &self.expected_selector {
            if *expected != opts.selector {
                return Err(FindError::Unexpected(format!(
                    "stub finder: expected selector \"{expected}\", got \"{}\"",
                    opts.selector
                )));
            }
        }

        self.result
            .clone()
            .ok_or_else(|| NotFoundError::new("no pull requests found").into())
    }
}
