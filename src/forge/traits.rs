//! forge::traits
//!
//! Forge trait definition and the API models it exchanges.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` to handle API errors gracefully. Callers that
//! need several independent resources issue the calls concurrently and join
//! them; implementations must therefore be `Send + Sync`.
//!
//! Models are forge-neutral Rust types. Wire formats live in the
//! implementations (see `forge::github`).
//!
//! # Example
//!
//! ```ignore
//! use ghr::forge::{Forge, ForgeError};
//! use ghr::core::types::Repo;
//!
//! async fn show(forge: &dyn Forge) -> Result<(), ForgeError> {
//!     let repo = Repo::new("octo", "hello");
//!     let pr = forge.pull_request_by_number(&repo, 42, &["title".into()]).await?;
//!     println!("#{} {}", pr.number, pr.title);
//!     Ok(())
//! }
//! ```

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::Repo;

/// Errors from forge operations.
///
/// These error types map to common failure modes when interacting
/// with remote hosting services like GitHub.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required; set GH_TOKEN or add a token to the config file")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The operation is not supported by this forge.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Pull request state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    #[default]
    Open,
    Closed,
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrState::Open => write!(f, "OPEN"),
            PrState::Closed => write!(f, "CLOSED"),
            PrState::Merged => write!(f, "MERGED"),
        }
    }
}

/// Cursor information for a paginated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One page of a list, with the total size of the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    pub total_count: u64,
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            total_count: 0,
            page_info: PageInfo::default(),
        }
    }
}

impl<T> Connection<T> {
    /// A complete, single-page list.
    pub fn complete(nodes: Vec<T>) -> Self {
        Self {
            total_count: nodes.len() as u64,
            nodes,
            page_info: PageInfo::default(),
        }
    }
}

/// A user or bot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actor {
    pub id: String,
    pub login: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Team {
    pub id: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    pub id: String,
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    pub title: String,
}

/// Membership of a pull request in a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectItem {
    pub id: String,
    pub project: Project,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    pub id: String,
    pub author: Actor,
    pub state: String,
    pub body: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    pub id: String,
    pub author: Actor,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// An issue the pull request closes when merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueRef {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
}

/// A check run or commit status on the head commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckContext {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
}

/// A pull request with whichever fields were requested populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequest {
    pub id: String,
    pub number: u64,
    pub url: String,
    pub title: String,
    pub body: String,
    pub state: PrState,
    pub is_draft: bool,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub is_cross_repository: bool,
    pub head_repository_owner: String,
    pub author: String,
    pub labels: Vec<Label>,
    pub assignees: Vec<Actor>,
    /// Requested reviewers: user logins and `org/slug` teams.
    pub review_requests: Vec<String>,
    pub milestone: Option<Milestone>,
    pub project_items: Vec<ProjectItem>,
    pub reviews: Connection<Review>,
    pub comments: Connection<Comment>,
    pub closing_issues_references: Connection<IssueRef>,
    pub status_checks: Connection<CheckContext>,
}

impl PullRequest {
    /// `owner:branch` for cross-repository pull requests, `branch` otherwise.
    pub fn head_label(&self) -> String {
        if self.is_cross_repository {
            format!("{}:{}", self.head_repository_owner, self.head_ref_name)
        } else {
            self.head_ref_name.clone()
        }
    }
}

/// Pull requests whose head has a given branch name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchPullRequests {
    pub pull_requests: Vec<PullRequest>,
    pub default_branch: String,
}

/// A repository as known to the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub repo: Repo,
    pub default_branch: String,
    /// `ADMIN`, `MAINTAIN`, `WRITE`, `TRIAGE`, `READ`, or absent.
    pub viewer_permission: Option<String>,
    pub parent: Option<Repo>,
}

impl Repository {
    pub fn viewer_can_push(&self) -> bool {
        matches!(
            self.viewer_permission.as_deref(),
            Some("ADMIN" | "MAINTAIN" | "WRITE")
        )
    }

    /// Whether the viewer may set labels, assignees and the like.
    pub fn viewer_can_triage(&self) -> bool {
        self.viewer_can_push() || self.viewer_permission.as_deref() == Some("TRIAGE")
    }
}

/// Which metadata lists to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoMetadataInput {
    pub assignees: bool,
    pub reviewers: bool,
    pub team_reviewers: bool,
    pub labels: bool,
    pub projects: bool,
    pub milestones: bool,
}

impl RepoMetadataInput {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Error translating names into node IDs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{0}' not found")]
pub struct MetadataNotFound(pub String);

/// Assignable users, labels, teams, projects and milestones of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoMetadata {
    pub assignable_users: Vec<Actor>,
    pub labels: Vec<Label>,
    pub teams: Vec<Team>,
    pub projects: Vec<Project>,
    pub milestones: Vec<Milestone>,
}

impl RepoMetadata {
    pub fn members_to_ids(&self, logins: &[String]) -> Result<Vec<String>, MetadataNotFound> {
        logins
            .iter()
            .map(|login| {
                self.assignable_users
                    .iter()
                    .find(|u| u.login.eq_ignore_ascii_case(login))
                    .map(|u| u.id.clone())
                    .ok_or_else(|| MetadataNotFound(login.clone()))
            })
            .collect()
    }

    pub fn labels_to_ids(&self, names: &[String]) -> Result<Vec<String>, MetadataNotFound> {
        names
            .iter()
            .map(|name| {
                self.labels
                    .iter()
                    .find(|l| l.name.eq_ignore_ascii_case(name))
                    .map(|l| l.id.clone())
                    .ok_or_else(|| MetadataNotFound(name.clone()))
            })
            .collect()
    }

    /// Translate `org/slug` team names.
    pub fn teams_to_ids(&self, names: &[String]) -> Result<Vec<String>, MetadataNotFound> {
        names
            .iter()
            .map(|name| {
                let slug = name.split_once('/').map_or(name.as_str(), |(_, s)| s);
                self.teams
                    .iter()
                    .find(|t| t.slug.eq_ignore_ascii_case(slug))
                    .map(|t| t.id.clone())
                    .ok_or_else(|| MetadataNotFound(name.clone()))
            })
            .collect()
    }

    pub fn projects_to_ids(&self, titles: &[String]) -> Result<Vec<String>, MetadataNotFound> {
        titles
            .iter()
            .map(|title| {
                self.projects
                    .iter()
                    .find(|p| p.title.eq_ignore_ascii_case(title))
                    .map(|p| p.id.clone())
                    .ok_or_else(|| MetadataNotFound(title.clone()))
            })
            .collect()
    }

    pub fn milestone_to_id(&self, title: &str) -> Result<String, MetadataNotFound> {
        self.milestones
            .iter()
            .find(|m| m.title.eq_ignore_ascii_case(title))
            .map(|m| m.id.clone())
            .ok_or_else(|| MetadataNotFound(title.to_string()))
    }
}

/// Reviewer sets for review requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reviewers {
    /// User logins
    pub users: Vec<String>,
    /// Team slugs, without the organization
    pub teams: Vec<String>,
}

impl Reviewers {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.teams.is_empty()
    }
}

/// Input for creating a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatePullRequestInput {
    pub base_ref_name: String,
    /// Qualified head ref (`owner:branch` for forks).
    pub head_ref_name: String,
    pub title: String,
    pub body: String,
    pub draft: bool,
    pub maintainer_can_modify: bool,
    pub label_ids: Vec<String>,
    pub assignee_ids: Vec<String>,
    pub milestone_id: Option<String>,
    pub project_ids: Vec<String>,
    pub reviewers: Reviewers,
}

/// Replacement of scalar pull request fields. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePullRequestInput {
    pub pull_request_id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub base_ref_name: Option<String>,
    pub assignee_ids: Option<Vec<String>>,
    /// `Some(None)` removes the milestone.
    pub milestone_id: Option<Option<String>>,
}

/// Project membership changes: (project id, item or content id) pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectItemChanges {
    /// (project id, pull request node id)
    pub add: Vec<(String, String)>,
    /// (project id, project item id)
    pub remove: Vec<(String, String)>,
}

/// Workflow run or job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Requested,
    Waiting,
    Pending,
    #[serde(other)]
    Unknown,
}

/// Outcome of a completed run, job, or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    Neutral,
    TimedOut,
    ActionRequired,
    StartupFailure,
    Stale,
    #[serde(other)]
    Unknown,
}

impl Conclusion {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Conclusion::Failure
                | Conclusion::TimedOut
                | Conclusion::ActionRequired
                | Conclusion::StartupFailure
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_title: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub head_branch: String,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub event: String,
    #[serde(default = "first_attempt")]
    pub run_attempt: u64,
    pub run_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: String,
}

fn first_attempt() -> u64 {
    1
}

impl WorkflowRun {
    /// Start time used to key cached logs.
    pub fn started_time(&self) -> DateTime<Utc> {
        self.run_started_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub steps: Vec<Step>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub run_id: u64,
}

/// Forge abstraction.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Forge name, e.g. `"github"`.
    fn name(&self) -> &'static str;

    /// Login of the authenticated user.
    async fn current_login(&self) -> Result<String, ForgeError>;

    async fn repository(&self, repo: &Repo) -> Result<Repository, ForgeError>;

    /// Forks of `repo`, at most `limit`.
    async fn repo_forks(&self, repo: &Repo, limit: usize) -> Result<Vec<Repository>, ForgeError>;

    /// Fork `repo` into the authenticated user's account.
    async fn fork_repo(&self, repo: &Repo) -> Result<Repository, ForgeError>;

    async fn pull_request_by_number(
        &self,
        repo: &Repo,
        number: u64,
        fields: &[String],
    ) -> Result<PullRequest, ForgeError>;

    /// Pull requests whose head branch is named `head_ref_name`, newest first.
    async fn pull_requests_for_branch(
        &self,
        repo: &Repo,
        head_ref_name: &str,
        states: &[PrState],
        fields: &[String],
    ) -> Result<BranchPullRequests, ForgeError>;

    async fn pull_request_reviews(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<Review>, ForgeError>;

    async fn pull_request_comments(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<Comment>, ForgeError>;

    async fn pull_request_closing_issues(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<IssueRef>, ForgeError>;

    async fn pull_request_status_checks(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<CheckContext>, ForgeError>;

    async fn repo_metadata(
        &self,
        repo: &Repo,
        input: RepoMetadataInput,
    ) -> Result<RepoMetadata, ForgeError>;

    async fn create_pull_request(
        &self,
        repo: &Repository,
        input: CreatePullRequestInput,
    ) -> Result<PullRequest, ForgeError>;

    async fn update_pull_request(
        &self,
        repo: &Repo,
        input: UpdatePullRequestInput,
    ) -> Result<(), ForgeError>;

    async fn add_labels(
        &self,
        repo: &Repo,
        pull_request_id: &str,
        label_ids: &[String],
    ) -> Result<(), ForgeError>;

    async fn remove_labels(
        &self,
        repo: &Repo,
        pull_request_id: &str,
        label_ids: &[String],
    ) -> Result<(), ForgeError>;

    async fn update_project_items(
        &self,
        repo: &Repo,
        changes: ProjectItemChanges,
    ) -> Result<(), ForgeError>;

    async fn request_reviews(
        &self,
        repo: &Repo,
        number: u64,
        reviewers: Reviewers,
    ) -> Result<(), ForgeError>;

    async fn remove_reviews(
        &self,
        repo: &Repo,
        number: u64,
        reviewers: Reviewers,
    ) -> Result<(), ForgeError>;

    async fn workflow_run(
        &self,
        repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<WorkflowRun, ForgeError>;

    async fn run_jobs(
        &self,
        repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<Vec<Job>, ForgeError>;

    async fn job(&self, repo: &Repo, job_id: u64) -> Result<Job, ForgeError>;

    /// Zip archive of all logs of a run attempt.
    async fn run_log_archive(
        &self,
        repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<Vec<u8>, ForgeError>;

    /// Plain-text log of a single job.
    async fn job_log(&self, repo: &Repo, job_id: u64) -> Result<String, ForgeError>;
}
