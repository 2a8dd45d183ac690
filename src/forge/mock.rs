//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge provides a deterministic implementation of the `Forge` trait
//! for use in tests. It stores repositories, pull requests and workflow runs
//! in memory and allows configuring failure scenarios. Every call is recorded
//! so tests can assert on what was sent.
//!
//! Paginated lists are configured as explicit pages; cursors are `page-N`.
//!
//! # Example
//!
//! ```
//! use ghr::core::types::Repo;
//! use ghr::forge::mock::MockForge;
//! use ghr::forge::{Forge, PullRequest};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let repo = Repo::new("octo", "hello");
//! let forge = MockForge::new().with_pull_request(
//!     &repo,
//!     PullRequest { number: 42, title: "Existing".into(), ..Default::default() },
//! );
//!
//! let pr = forge.pull_request_by_number(&repo, 42, &[]).await.unwrap();
//! assert_eq!(pr.title, "Existing");
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::traits::{
    BranchPullRequests, CheckContext, Comment, Connection, CreatePullRequestInput, Forge,
    ForgeError, IssueRef, Job, PageInfo, PrState, ProjectItemChanges, PullRequest, RepoMetadata,
    RepoMetadataInput, Repository, Review, Reviewers, UpdatePullRequestInput, WorkflowRun,
};
use crate::core::types::Repo;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

#[derive(Debug, Default)]
struct MockForgeInner {
    login: String,
    repositories: HashMap<String, Repository>,
    forks: HashMap<String, Vec<Repository>>,
    /// Pull requests with the repository they belong to.
    prs: Vec<(Repo, PullRequest)>,
    next_pr_number: u64,
    metadata: RepoMetadata,
    review_pages: HashMap<u64, Vec<Connection<Review>>>,
    comment_pages: HashMap<u64, Vec<Connection<Comment>>>,
    closing_issue_pages: HashMap<u64, Vec<Connection<IssueRef>>>,
    status_check_pages: HashMap<u64, Vec<Connection<CheckContext>>>,
    runs: HashMap<u64, WorkflowRun>,
    jobs: HashMap<u64, Vec<Job>>,
    run_log_archives: HashMap<u64, Vec<u8>>,
    job_logs: HashMap<u64, String>,
    fail_on: Vec<FailOn>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    CurrentLogin(ForgeError),
    Repository(ForgeError),
    RepoForks(ForgeError),
    ForkRepo(ForgeError),
    PullRequestByNumber(ForgeError),
    PullRequestsForBranch(ForgeError),
    /// Any of the paginated pull request lists.
    PullRequestPage(ForgeError),
    RepoMetadata(ForgeError),
    CreatePullRequest(ForgeError),
    UpdatePullRequest(ForgeError),
    AddLabels(ForgeError),
    RemoveLabels(ForgeError),
    UpdateProjectItems(ForgeError),
    RequestReviews(ForgeError),
    RemoveReviews(ForgeError),
    WorkflowRun(ForgeError),
    RunJobs(ForgeError),
    Job(ForgeError),
    RunLogArchive(ForgeError),
    JobLog(ForgeError),
}

impl FailOn {
    fn matches(&self, op: &MockOperation) -> Option<ForgeError> {
        use MockOperation as Op;
        let error = match (self, op) {
            (FailOn::CurrentLogin(e), Op::CurrentLogin)
            | (FailOn::Repository(e), Op::Repository { .. })
            | (FailOn::RepoForks(e), Op::RepoForks { .. })
            | (FailOn::ForkRepo(e), Op::ForkRepo { .. })
            | (FailOn::PullRequestByNumber(e), Op::PullRequestByNumber { .. })
            | (FailOn::PullRequestsForBranch(e), Op::PullRequestsForBranch { .. })
            | (FailOn::PullRequestPage(e), Op::PullRequestPage { .. })
            | (FailOn::RepoMetadata(e), Op::RepoMetadata { .. })
            | (FailOn::CreatePullRequest(e), Op::CreatePullRequest { .. })
            | (FailOn::UpdatePullRequest(e), Op::UpdatePullRequest { .. })
            | (FailOn::AddLabels(e), Op::AddLabels { .. })
            | (FailOn::RemoveLabels(e), Op::RemoveLabels { .. })
            | (FailOn::UpdateProjectItems(e), Op::UpdateProjectItems { .. })
            | (FailOn::RequestReviews(e), Op::RequestReviews { .. })
            | (FailOn::RemoveReviews(e), Op::RemoveReviews { .. })
            | (FailOn::WorkflowRun(e), Op::WorkflowRun { .. })
            | (FailOn::RunJobs(e), Op::RunJobs { .. })
            | (FailOn::Job(e), Op::Job { .. })
            | (FailOn::RunLogArchive(e), Op::RunLogArchive { .. })
            | (FailOn::JobLog(e), Op::JobLog { .. }) => e,
            _ => return None,
        };
        Some(error.clone())
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    CurrentLogin,
    Repository {
        repo: String,
    },
    RepoForks {
        repo: String,
        limit: usize,
    },
    ForkRepo {
        repo: String,
    },
    PullRequestByNumber {
        repo: String,
        number: u64,
        fields: Vec<String>,
    },
    PullRequestsForBranch {
        repo: String,
        head: String,
        states: Vec<PrState>,
        fields: Vec<String>,
    },
    PullRequestPage {
        list: &'static str,
        number: u64,
        after: Option<String>,
    },
    RepoMetadata {
        repo: String,
        input: RepoMetadataInput,
    },
    CreatePullRequest {
        repo: String,
        input: CreatePullRequestInput,
    },
    UpdatePullRequest {
        input: UpdatePullRequestInput,
    },
    AddLabels {
        pull_request_id: String,
        label_ids: Vec<String>,
    },
    RemoveLabels {
        pull_request_id: String,
        label_ids: Vec<String>,
    },
    UpdateProjectItems {
        changes: ProjectItemChanges,
    },
    RequestReviews {
        number: u64,
        reviewers: Reviewers,
    },
    RemoveReviews {
        number: u64,
        reviewers: Reviewers,
    },
    WorkflowRun {
        run_id: u64,
        attempt: Option<u64>,
    },
    RunJobs {
        run_id: u64,
        attempt: Option<u64>,
    },
    Job {
        job_id: u64,
    },
    RunLogArchive {
        run_id: u64,
        attempt: Option<u64>,
    },
    JobLog {
        job_id: u64,
    },
}

fn key(repo: &Repo) -> String {
    repo.full_name().to_lowercase()
}

/// Build linked pages from raw node lists.
fn paginate<T>(pages: Vec<Vec<T>>) -> Vec<Connection<T>> {
    let total: usize = pages.iter().map(Vec::len).sum();
    let count = pages.len();
    pages
        .into_iter()
        .enumerate()
        .map(|(i, nodes)| Connection {
            nodes,
            total_count: total as u64,
            page_info: PageInfo {
                has_next_page: i + 1 < count,
                end_cursor: Some(format!("page-{}", i + 1)),
            },
        })
        .collect()
}

fn page_of<T: Clone>(
    pages: &HashMap<u64, Vec<Connection<T>>>,
    number: u64,
    after: Option<&str>,
) -> Result<Connection<T>, ForgeError> {
    let index = match after {
        None => 0,
        Some(cursor) => cursor
            .strip_prefix("page-")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| ForgeError::ApiError {
                status: 200,
                message: format!("invalid cursor {cursor}"),
            })?,
    };
    Ok(pages
        .get(&number)
        .and_then(|p| p.get(index))
        .cloned()
        .unwrap_or_default())
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        let forge = Self::default();
        {
            let mut inner = forge.lock();
            inner.login = "monalisa".into();
            inner.next_pr_number = 1;
        }
        forge
    }

    fn lock(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_login(self, login: &str) -> Self {
        self.lock().login = login.to_string();
        self
    }

    pub fn with_repository(self, repository: Repository) -> Self {
        self.lock()
            .repositories
            .insert(key(&repository.repo), repository);
        self
    }

    /// Register an existing fork of `parent`.
    pub fn with_fork(self, parent: &Repo, fork: Repository) -> Self {
        self.lock().forks.entry(key(parent)).or_default().push(fork);
        self
    }

    pub fn with_pull_request(self, repo: &Repo, pr: PullRequest) -> Self {
        {
            let mut inner = self.lock();
            inner.next_pr_number = inner.next_pr_number.max(pr.number + 1);
            inner.prs.push((repo.clone(), pr));
        }
        self
    }

    pub fn with_metadata(self, metadata: RepoMetadata) -> Self {
        self.lock().metadata = metadata;
        self
    }

    pub fn with_review_pages(self, number: u64, pages: Vec<Vec<Review>>) -> Self {
        self.lock().review_pages.insert(number, paginate(pages));
        self
    }

    pub fn with_comment_pages(self, number: u64, pages: Vec<Vec<Comment>>) -> Self {
        self.lock().comment_pages.insert(number, paginate(pages));
        self
    }

    pub fn with_closing_issue_pages(self, number: u64, pages: Vec<Vec<IssueRef>>) -> Self {
        self.lock()
            .closing_issue_pages
            .insert(number, paginate(pages));
        self
    }

    pub fn with_status_check_pages(self, number: u64, pages: Vec<Vec<CheckContext>>) -> Self {
        self.lock()
            .status_check_pages
            .insert(number, paginate(pages));
        self
    }

    pub fn with_run(self, run: WorkflowRun) -> Self {
        self.lock().runs.insert(run.id, run);
        self
    }

    pub fn with_jobs(self, run_id: u64, jobs: Vec<Job>) -> Self {
        self.lock().jobs.insert(run_id, jobs);
        self
    }

    pub fn with_run_log_archive(self, run_id: u64, archive: Vec<u8>) -> Self {
        self.lock().run_log_archives.insert(run_id, archive);
        self
    }

    pub fn with_job_log(self, job_id: u64, log: &str) -> Self {
        self.lock().job_logs.insert(job_id, log.to_string());
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use ghr::forge::mock::{MockForge, FailOn};
    /// use ghr::forge::ForgeError;
    ///
    /// let forge = MockForge::new()
    ///     .fail_on(FailOn::CreatePullRequest(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on.push(fail_on);
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Current state of a stored pull request.
    pub fn pull_request(&self, number: u64) -> Option<PullRequest> {
        self.lock()
            .prs
            .iter()
            .find(|(_, pr)| pr.number == number)
            .map(|(_, pr)| pr.clone())
    }

    /// Record an operation and return the configured failure, if any.
    fn record(&self, op: MockOperation) -> Result<(), ForgeError> {
        let mut inner = self.lock();
        let failure = inner.fail_on.iter().find_map(|f| f.matches(&op));
        inner.operations.push(op);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn repository_for(inner: &MockForgeInner, repo: &Repo) -> Repository {
        inner
            .repositories
            .get(&key(repo))
            .cloned()
            .unwrap_or_else(|| Repository {
                id: format!("R_{}", repo.full_name()),
                repo: repo.clone(),
                default_branch: "main".into(),
                viewer_permission: Some("WRITE".into()),
                parent: None,
            })
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn current_login(&self) -> Result<String, ForgeError> {
        self.record(MockOperation::CurrentLogin)?;
        Ok(self.lock().login.clone())
    }

    async fn repository(&self, repo: &Repo) -> Result<Repository, ForgeError> {
        self.record(MockOperation::Repository {
            repo: repo.full_name(),
        })?;
        Ok(Self::repository_for(&self.lock(), repo))
    }

    async fn repo_forks(&self, repo: &Repo, limit: usize) -> Result<Vec<Repository>, ForgeError> {
        self.record(MockOperation::RepoForks {
            repo: repo.full_name(),
            limit,
        })?;
        Ok(self
            .lock()
            .forks
            .get(&key(repo))
            .map(|forks| forks.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn fork_repo(&self, repo: &Repo) -> Result<Repository, ForgeError> {
        self.record(MockOperation::ForkRepo {
            repo: repo.full_name(),
        })?;
        let mut inner = self.lock();
        let parent = Self::repository_for(&inner, repo);
        let fork = Repository {
            id: format!("R_fork_{}", repo.name()),
            repo: Repo::with_host(repo.host(), inner.login.clone(), repo.name()),
            default_branch: parent.default_branch,
            viewer_permission: Some("ADMIN".into()),
            parent: Some(repo.clone()),
        };
        inner.forks.entry(key(repo)).or_default().push(fork.clone());
        inner.repositories.insert(key(&fork.repo), fork.clone());
        Ok(fork)
    }

    async fn pull_request_by_number(
        &self,
        repo: &Repo,
        number: u64,
        fields: &[String],
    ) -> Result<PullRequest, ForgeError> {
        self.record(MockOperation::PullRequestByNumber {
            repo: repo.full_name(),
            number,
            fields: fields.to_vec(),
        })?;
        self.lock()
            .prs
            .iter()
            .find(|(r, pr)| r.is_same(repo) && pr.number == number)
            .map(|(_, pr)| pr.clone())
            .ok_or_else(|| {
                ForgeError::NotFound(format!(
                    "Could not resolve to a PullRequest with the number of {number}."
                ))
            })
    }

    async fn pull_requests_for_branch(
        &self,
        repo: &Repo,
        head_ref_name: &str,
        states: &[PrState],
        fields: &[String],
    ) -> Result<BranchPullRequests, ForgeError> {
        self.record(MockOperation::PullRequestsForBranch {
            repo: repo.full_name(),
            head: head_ref_name.to_string(),
            states: states.to_vec(),
            fields: fields.to_vec(),
        })?;
        let inner = self.lock();
        let mut pull_requests: Vec<PullRequest> = inner
            .prs
            .iter()
            .filter(|(r, pr)| {
                r.is_same(repo)
                    && pr.head_ref_name == head_ref_name
                    && (states.is_empty() || states.contains(&pr.state))
            })
            .map(|(_, pr)| pr.clone())
            .collect();
        pull_requests.sort_by(|a, b| b.number.cmp(&a.number));

        Ok(BranchPullRequests {
            pull_requests,
            default_branch: Self::repository_for(&inner, repo).default_branch,
        })
    }

    async fn pull_request_reviews(
        &self,
        _repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<Review>, ForgeError> {
        self.record(MockOperation::PullRequestPage {
            list: "reviews",
            number,
            after: after.clone(),
        })?;
        page_of(&self.lock().review_pages, number, after.as_deref())
    }

    async fn pull_request_comments(
        &self,
        _repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<Comment>, ForgeError> {
        self.record(MockOperation::PullRequestPage {
            list: "comments",
            number,
            after: after.clone(),
        })?;
        page_of(&self.lock().comment_pages, number, after.as_deref())
    }

    async fn pull_request_closing_issues(
        &self,
        _repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<IssueRef>, ForgeError> {
        self.record(MockOperation::PullRequestPage {
            list: "closingIssuesReferences",
            number,
            after: after.clone(),
        })?;
        page_of(&self.lock().closing_issue_pages, number, after.as_deref())
    }

    async fn pull_request_status_checks(
        &self,
        _repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<CheckContext>, ForgeError> {
        self.record(MockOperation::PullRequestPage {
            list: "statusCheckRollup",
            number,
            after: after.clone(),
        })?;
        page_of(&self.lock().status_check_pages, number, after.as_deref())
    }

    async fn repo_metadata(
        &self,
        repo: &Repo,
        input: RepoMetadataInput,
    ) -> Result<RepoMetadata, ForgeError> {
        self.record(MockOperation::RepoMetadata {
            repo: repo.full_name(),
            input,
        })?;
        let metadata = self.lock().metadata.clone();
        Ok(RepoMetadata {
            assignable_users: if input.assignees || input.reviewers {
                metadata.assignable_users
            } else {
                Vec::new()
            },
            labels: if input.labels { metadata.labels } else { Vec::new() },
            teams: if input.team_reviewers {
                metadata.teams
            } else {
                Vec::new()
            },
            projects: if input.projects {
                metadata.projects
            } else {
                Vec::new()
            },
            milestones: if input.milestones {
                metadata.milestones
            } else {
                Vec::new()
            },
        })
    }

    async fn create_pull_request(
        &self,
        repo: &Repository,
        input: CreatePullRequestInput,
    ) -> Result<PullRequest, ForgeError> {
        self.record(MockOperation::CreatePullRequest {
            repo: repo.repo.full_name(),
            input: input.clone(),
        })?;

        let mut inner = self.lock();
        let number = inner.next_pr_number.max(1);
        inner.next_pr_number = number + 1;

        let (head_owner, head_branch) = match input.head_ref_name.split_once(':') {
            Some((owner, branch)) => (owner.to_string(), branch.to_string()),
            None => (repo.repo.owner().to_string(), input.head_ref_name.clone()),
        };

        let pr = PullRequest {
            id: format!("PR_{}", number),
            number,
            url: format!(
                "https://{}/{}/pull/{}",
                repo.repo.host(),
                repo.repo.full_name(),
                number
            ),
            title: input.title,
            body: input.body,
            state: PrState::Open,
            is_draft: input.draft,
            base_ref_name: input.base_ref_name,
            is_cross_repository: !head_owner.eq_ignore_ascii_case(repo.repo.owner()),
            head_ref_name: head_branch,
            head_repository_owner: head_owner,
            author: inner.login.clone(),
            ..Default::default()
        };

        inner.prs.push((repo.repo.clone(), pr.clone()));
        Ok(pr)
    }

    async fn update_pull_request(
        &self,
        _repo: &Repo,
        input: UpdatePullRequestInput,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::UpdatePullRequest {
            input: input.clone(),
        })?;

        let mut inner = self.lock();
        let (_, pr) = inner
            .prs
            .iter_mut()
            .find(|(_, pr)| pr.id == input.pull_request_id)
            .ok_or_else(|| ForgeError::NotFound(input.pull_request_id.clone()))?;

        if let Some(title) = input.title {
            pr.title = title;
        }
        if let Some(body) = input.body {
            pr.body = body;
        }
        if let Some(base) = input.base_ref_name {
            pr.base_ref_name = base;
        }
        Ok(())
    }

    async fn add_labels(
        &self,
        _repo: &Repo,
        pull_request_id: &str,
        label_ids: &[String],
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::AddLabels {
            pull_request_id: pull_request_id.to_string(),
            label_ids: label_ids.to_vec(),
        })
    }

    async fn remove_labels(
        &self,
        _repo: &Repo,
        pull_request_id: &str,
        label_ids: &[String],
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::RemoveLabels {
            pull_request_id: pull_request_id.to_string(),
            label_ids: label_ids.to_vec(),
        })
    }

    async fn update_project_items(
        &self,
        _repo: &Repo,
        changes: ProjectItemChanges,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::UpdateProjectItems { changes })
    }

    async fn request_reviews(
        &self,
        _repo: &Repo,
        number: u64,
        reviewers: Reviewers,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::RequestReviews { number, reviewers })
    }

    async fn remove_reviews(
        &self,
        _repo: &Repo,
        number: u64,
        reviewers: Reviewers,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::RemoveReviews { number, reviewers })
    }

    async fn workflow_run(
        &self,
        _repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<WorkflowRun, ForgeError> {
        self.record(MockOperation::WorkflowRun { run_id, attempt })?;
        let mut run = self
            .lock()
            .runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("run {run_id}")))?;
        if let Some(attempt) = attempt {
            run.run_attempt = attempt;
        }
        Ok(run)
    }

    async fn run_jobs(
        &self,
        _repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<Vec<Job>, ForgeError> {
        self.record(MockOperation::RunJobs { run_id, attempt })?;
        Ok(self.lock().jobs.get(&run_id).cloned().unwrap_or_default())
    }

    async fn job(&self, _repo: &Repo, job_id: u64) -> Result<Job, ForgeError> {
        self.record(MockOperation::Job { job_id })?;
        self.lock()
            .jobs
            .values()
            .flatten()
            .find(|j| j.id == job_id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("job {job_id}")))
    }

    async fn run_log_archive(
        &self,
        _repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<Vec<u8>, ForgeError> {
        self.record(MockOperation::RunLogArchive { run_id, attempt })?;
        self.lock()
            .run_log_archives
            .get(&run_id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("log not found".into()))
    }

    async fn job_log(&self, _repo: &Repo, job_id: u64) -> Result<String, ForgeError> {
        self.record(MockOperation::JobLog { job_id })?;
        self.lock()
            .job_logs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("log not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repo {
        Repo::new("octo", "hello")
    }

    fn pr(number: u64, head: &str, state: PrState) -> PullRequest {
        PullRequest {
            id: format!("PR_{number}"),
            number,
            head_ref_name: head.into(),
            state,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_numbers_after_existing() {
        let forge = MockForge::new().with_pull_request(&repo(), pr(42, "old", PrState::Open));
        let repository = forge.repository(&repo()).await.unwrap();

        let created = forge
            .create_pull_request(
                &repository,
                CreatePullRequestInput {
                    base_ref_name: "main".into(),
                    head_ref_name: "monalisa:feature".into(),
                    title: "Add feature".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(created.number, 43);
        assert!(created.is_cross_repository);
        assert_eq!(created.head_label(), "monalisa:feature");
        assert_eq!(created.url, "https://github.com/octo/hello/pull/43");
    }

    #[tokio::test]
    async fn branch_lookup_filters_by_state_newest_first() {
        let forge = MockForge::new()
            .with_pull_request(&repo(), pr(1, "feature", PrState::Closed))
            .with_pull_request(&repo(), pr(2, "feature", PrState::Open))
            .with_pull_request(&repo(), pr(3, "other", PrState::Open));

        let all = forge
            .pull_requests_for_branch(&repo(), "feature", &[], &[])
            .await
            .unwrap();
        let numbers: Vec<u64> = all.pull_requests.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![2, 1]);
        assert_eq!(all.default_branch, "main");

        let open = forge
            .pull_requests_for_branch(&repo(), "feature", &[PrState::Open], &[])
            .await
            .unwrap();
        assert_eq!(open.pull_requests.len(), 1);
    }

    #[tokio::test]
    async fn pages_link_by_cursor() {
        let review = |id: &str| Review {
            id: id.into(),
            ..Default::default()
        };
        let forge = MockForge::new()
            .with_review_pages(7, vec![vec![review("a"), review("b")], vec![review("c")]]);

        let first = forge.pull_request_reviews(&repo(), 7, None).await.unwrap();
        assert_eq!(first.total_count, 3);
        assert!(first.page_info.has_next_page);

        let second = forge
            .pull_request_reviews(&repo(), 7, first.page_info.end_cursor)
            .await
            .unwrap();
        assert_eq!(second.nodes, vec![review("c")]);
        assert!(!second.page_info.has_next_page);
    }

    #[tokio::test]
    async fn fail_on_returns_error_and_records() {
        let forge = MockForge::new().fail_on(FailOn::ForkRepo(ForgeError::RateLimited));

        let result = forge.fork_repo(&repo()).await;
        assert_eq!(result.unwrap_err(), ForgeError::RateLimited);
        assert_eq!(
            forge.operations(),
            vec![MockOperation::ForkRepo {
                repo: "octo/hello".into()
            }]
        );
    }

    #[tokio::test]
    async fn fork_is_owned_by_login() {
        let forge = MockForge::new().with_login("hubot");
        let fork = forge.fork_repo(&repo()).await.unwrap();
        assert_eq!(fork.repo.full_name(), "hubot/hello");
        assert!(fork.viewer_can_push());
        assert_eq!(forge.repo_forks(&repo(), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_log_is_not_found() {
        let forge = MockForge::new();
        let err = forge.run_log_archive(&repo(), 1, None).await.unwrap_err();
        assert_eq!(err, ForgeError::NotFound("log not found".into()));
    }

    #[test]
    fn forge_name() {
        assert_eq!(MockForge::new().name(), "mock");
    }
}
