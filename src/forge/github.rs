//! forge::github
//!
//! GitHub forge implementation using REST and GraphQL APIs.
//!
//! # Design
//!
//! This module implements the `Forge` trait for GitHub. It uses:
//! - GraphQL for pull requests, repository metadata and metadata mutations
//! - REST for forking, review requests and Actions runs, jobs and logs
//!
//! Pull request queries select only the fields the caller asked for; see
//! [`pull_request_graphql`].
//!
//! # Rate Limiting
//!
//! GitHub has rate limits. This implementation:
//! - Returns `ForgeError::RateLimited` when limits are hit
//! - Does not implement automatic retry for rate limits (caller's responsibility)
//!
//! # Example
//!
//! ```ignore
//! use ghr::forge::github::GitHubForge;
//! use ghr::forge::Forge;
//! use ghr::core::types::Repo;
//!
//! let forge = GitHubForge::new("github.com", Some(token));
//! let login = forge.current_login().await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::traits::{
    Actor, BranchPullRequests, CheckContext, Comment, Connection, CreatePullRequestInput, Forge,
    ForgeError, IssueRef, Job, Label, Milestone, PageInfo, PrState, Project, ProjectItem,
    ProjectItemChanges, PullRequest, RepoMetadata, RepoMetadataInput, Repository, Review,
    Reviewers, Team, UpdatePullRequestInput, WorkflowRun,
};
use crate::core::types::{Repo, DEFAULT_HOST};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "ghr-cli";

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token, if one is configured
    token: Option<String>,
    /// Host that repositories created by this forge live on
    host: String,
    /// REST API base URL
    api_base: String,
    /// GraphQL endpoint
    graphql_url: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("has_token", &self.token.is_some())
            .field("host", &self.host)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubForge {
    /// Create a forge for `host`.
    ///
    /// `github.com` uses `api.github.com`; any other host is treated as a
    /// GitHub Enterprise Server at `https://<host>/api/v3`.
    pub fn new(host: &str, token: Option<String>) -> Self {
        let (api_base, graphql_url) = if host == DEFAULT_HOST {
            (
                "https://api.github.com".to_string(),
                "https://api.github.com/graphql".to_string(),
            )
        } else {
            (
                format!("https://{host}/api/v3"),
                format!("https://{host}/api/graphql"),
            )
        };

        Self {
            client: Client::new(),
            token,
            host: host.to_string(),
            api_base,
            graphql_url,
        }
    }

    /// Create a forge against a custom API base URL.
    ///
    /// GraphQL is served from `<api_base>/graphql`. Used for tests against a
    /// local HTTP server.
    pub fn with_api_base(host: &str, token: Option<String>, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            token,
            host: host.to_string(),
            graphql_url: format!("{api_base}/graphql"),
            api_base,
        }
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let token = self.token.as_deref().ok_or(ForgeError::AuthRequired)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, repo: &Repo, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base,
            repo.owner(),
            repo.name(),
            path
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, ForgeError> {
        debug!(%method, url, "REST request");
        let mut request = self.client.request(method, url).headers(self.headers()?);
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    /// Issue a REST request and decode the JSON response.
    async fn rest<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, ForgeError> {
        let response = self.send(method, url, body).await?;
        self.handle_response(response).await
    }

    /// Issue a REST request whose response body is not needed.
    async fn rest_empty(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(), ForgeError> {
        let response = self.send(method, url, body).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Issue a GET request and return the raw body.
    async fn rest_bytes(&self, url: &str) -> Result<Vec<u8>, ForgeError> {
        let response = self.send(Method::GET, url, None).await?;
        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(response, status).await;
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        // GitHub Apps use X-Accepted-GitHub-Permissions, classic OAuth uses X-Accepted-OAuth-Scopes.
        let headers = response.headers();
        let required = headers
            .get("X-Accepted-GitHub-Permissions")
            .or_else(|| headers.get("X-Accepted-OAuth-Scopes"))
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if message.to_lowercase().contains("rate limit") => {
                ForgeError::RateLimited
            }
            StatusCode::FORBIDDEN => {
                let mut err_msg = format!("Permission denied: {}", message);
                if let Some(required) = required {
                    err_msg.push_str(&format!(" [required: {}]", required));
                }
                ForgeError::AuthFailed(err_msg)
            }
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Execute a GraphQL document and return its `data`.
    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, ForgeError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .send(Method::POST, &self.graphql_url, Some(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(response, status).await;
        }

        let result: GraphQLResponse = response.json().await.map_err(|e| ForgeError::ApiError {
            status: status.as_u16(),
            message: format!("Failed to parse GraphQL response: {}", e),
        })?;

        if let Some(error) = result.errors.into_iter().next() {
            return Err(match error.kind.as_deref() {
                Some("NOT_FOUND") => ForgeError::NotFound(error.message),
                _ => ForgeError::ApiError {
                    status: 200,
                    message: error.message,
                },
            });
        }

        result.data.ok_or_else(|| ForgeError::ApiError {
            status: 200,
            message: "GraphQL response contained no data".into(),
        })
    }

    /// Execute a GraphQL query and decode the value at `pointer` in `data`.
    async fn graphql_at<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        pointer: &str,
    ) -> Result<T, ForgeError> {
        let data = self.graphql(query, variables).await?;
        let value = data.pointer(pointer).cloned().unwrap_or(Value::Null);
        if value.is_null() {
            return Err(ForgeError::NotFound(format!(
                "GraphQL response has no value at {pointer}"
            )));
        }
        serde_json::from_value(value).map_err(|e| ForgeError::ApiError {
            status: 200,
            message: format!("Failed to parse GraphQL response: {}", e),
        })
    }

    fn repo_variables(repo: &Repo) -> Value {
        json!({ "owner": repo.owner(), "repo": repo.name() })
    }

    fn to_repository(&self, raw: GraphQLRepository) -> Repository {
        Repository {
            id: raw.id,
            repo: Repo::with_host(&self.host, raw.owner.login, raw.name),
            default_branch: raw.default_branch_ref.map(|r| r.name).unwrap_or_default(),
            viewer_permission: raw.viewer_permission,
            parent: raw
                .parent
                .map(|p| Repo::with_host(&self.host, p.owner.login, p.name)),
        }
    }

    async fn pull_request_connection<T: DeserializeOwned>(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
        selection: &str,
        pointer: &str,
    ) -> Result<Connection<T>, ForgeError> {
        let query = format!(
            "query PullRequestPage($owner: String!, $repo: String!, $number: Int!, $endCursor: String) {{
                repository(owner: $owner, name: $repo) {{
                    pullRequest(number: $number) {{ {selection} }}
                }}
            }}"
        );
        let mut variables = Self::repo_variables(repo);
        variables["number"] = json!(number);
        variables["endCursor"] = json!(after);
        self.graphql_at(&query, variables, pointer).await
    }
}

/// Build the GraphQL selection for the requested pull request fields.
///
/// Unknown field names are skipped.
pub fn pull_request_graphql(fields: &[String]) -> String {
    const PAGE: &str = "pageInfo { hasNextPage endCursor } totalCount";

    fields
        .iter()
        .filter_map(|field| {
            let selection = match field.as_str() {
                "id" | "number" | "url" | "title" | "body" | "state" | "isDraft"
                | "baseRefName" | "headRefName" | "isCrossRepository" => field.clone(),
                "headRepositoryOwner" => "headRepositoryOwner { login }".into(),
                "author" => "author { login }".into(),
                "labels" => "labels(first: 100) { nodes { id name } totalCount }".into(),
                "assignees" => "assignees(first: 100) { nodes { id login name } totalCount }".into(),
                "reviewRequests" => "reviewRequests(first: 100) { nodes { requestedReviewer { \
                     __typename ... on User { login } \
                     ... on Team { slug organization { login } } } } }"
                    .into(),
                "milestone" => "milestone { id number title }".into(),
                "projectItems" => {
                    "projectItems(first: 100) { nodes { id project { id title } } totalCount }"
                        .into()
                }
                "reviews" => format!(
                    "reviews(first: 100) {{ nodes {{ id author {{ login }} state body submittedAt }} {PAGE} }}"
                ),
                "comments" => format!(
                    "comments(first: 100) {{ nodes {{ id author {{ login }} body createdAt }} {PAGE} }}"
                ),
                "closingIssuesReferences" => format!(
                    "closingIssuesReferences(first: 100) {{ nodes {{ id number title url }} {PAGE} }}"
                ),
                "statusCheckRollup" => format!(
                    "statusCheckRollup: commits(last: 1) {{ nodes {{ commit {{ statusCheckRollup {{ \
                     contexts(first: 100) {{ nodes {{ __typename \
                     ... on CheckRun {{ name status conclusion }} \
                     ... on StatusContext {{ context state }} }} {PAGE} }} }} }} }} }}"
                ),
                other => {
                    debug!(field = other, "skipping unknown pull request field");
                    return None;
                }
            };
            Some(selection)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn current_login(&self) -> Result<String, ForgeError> {
        self.graphql_at("query UserCurrent { viewer { login } }", json!({}), "/viewer/login")
            .await
    }

    async fn repository(&self, repo: &Repo) -> Result<Repository, ForgeError> {
        let raw: GraphQLRepository = self
            .graphql_at(
                "query RepositoryInfo($owner: String!, $repo: String!) {
                    repository(owner: $owner, name: $repo) {
                        id name owner { login } defaultBranchRef { name } viewerPermission
                        parent { id name owner { login } }
                    }
                }",
                Self::repo_variables(repo),
                "/repository",
            )
            .await?;
        Ok(self.to_repository(raw))
    }

    async fn repo_forks(&self, repo: &Repo, limit: usize) -> Result<Vec<Repository>, ForgeError> {
        let mut variables = Self::repo_variables(repo);
        variables["limit"] = json!(limit);
        let forks: Connection<GraphQLRepository> = self
            .graphql_at(
                "query RepositoryFindFork($owner: String!, $repo: String!, $limit: Int!) {
                    repository(owner: $owner, name: $repo) {
                        forks(first: $limit, affiliations: [OWNER, COLLABORATOR]) {
                            nodes { id name owner { login } defaultBranchRef { name } viewerPermission }
                        }
                    }
                }",
                variables,
                "/repository/forks",
            )
            .await?;
        Ok(forks
            .nodes
            .into_iter()
            .map(|raw| self.to_repository(raw))
            .collect())
    }

    async fn fork_repo(&self, repo: &Repo) -> Result<Repository, ForgeError> {
        let url = self.repo_url(repo, "forks");
        let fork: RestRepository = self.rest(Method::POST, &url, Some(&json!({}))).await?;
        Ok(Repository {
            id: fork.node_id,
            repo: Repo::with_host(&self.host, fork.owner.login, fork.name),
            default_branch: fork.default_branch,
            viewer_permission: Some("ADMIN".into()),
            parent: Some(repo.clone()),
        })
    }

    async fn pull_request_by_number(
        &self,
        repo: &Repo,
        number: u64,
        fields: &[String],
    ) -> Result<PullRequest, ForgeError> {
        let query = format!(
            "query PullRequestByNumber($owner: String!, $repo: String!, $pr_number: Int!) {{
                repository(owner: $owner, name: $repo) {{
                    pullRequest(number: $pr_number) {{ {} }}
                }}
            }}",
            pull_request_graphql(fields)
        );
        let mut variables = Self::repo_variables(repo);
        variables["pr_number"] = json!(number);

        let raw: GraphQLPullRequest = self
            .graphql_at(&query, variables, "/repository/pullRequest")
            .await?;
        Ok(raw.into())
    }

    async fn pull_requests_for_branch(
        &self,
        repo: &Repo,
        head_ref_name: &str,
        states: &[PrState],
        fields: &[String],
    ) -> Result<BranchPullRequests, ForgeError> {
        let query = format!(
            "query PullRequestForBranch($owner: String!, $repo: String!, $headRefName: String!, $states: [PullRequestState!]) {{
                repository(owner: $owner, name: $repo) {{
                    pullRequests(headRefName: $headRefName, states: $states, first: 30, orderBy: {{ field: CREATED_AT, direction: DESC }}) {{
                        nodes {{ {} }}
                    }}
                    defaultBranchRef {{ name }}
                }}
            }}",
            pull_request_graphql(fields)
        );
        let mut variables = Self::repo_variables(repo);
        variables["headRefName"] = json!(head_ref_name);
        variables["states"] = if states.is_empty() {
            Value::Null
        } else {
            json!(states)
        };

        let raw: GraphQLBranchPullRequests =
            self.graphql_at(&query, variables, "/repository").await?;
        Ok(BranchPullRequests {
            pull_requests: raw
                .pull_requests
                .nodes
                .into_iter()
                .map(PullRequest::from)
                .collect(),
            default_branch: raw.default_branch_ref.map(|r| r.name).unwrap_or_default(),
        })
    }

    async fn pull_request_reviews(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<Review>, ForgeError> {
        self.pull_request_connection(
            repo,
            number,
            after,
            "reviews(first: 100, after: $endCursor) { nodes { id author { login } state body submittedAt } pageInfo { hasNextPage endCursor } totalCount }",
            "/repository/pullRequest/reviews",
        )
        .await
    }

    async fn pull_request_comments(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<Comment>, ForgeError> {
        self.pull_request_connection(
            repo,
            number,
            after,
            "comments(first: 100, after: $endCursor) { nodes { id author { login } body createdAt } pageInfo { hasNextPage endCursor } totalCount }",
            "/repository/pullRequest/comments",
        )
        .await
    }

    async fn pull_request_closing_issues(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<IssueRef>, ForgeError> {
        self.pull_request_connection(
            repo,
            number,
            after,
            "closingIssuesReferences(first: 100, after: $endCursor) { nodes { id number title url } pageInfo { hasNextPage endCursor } totalCount }",
            "/repository/pullRequest/closingIssuesReferences",
        )
        .await
    }

    async fn pull_request_status_checks(
        &self,
        repo: &Repo,
        number: u64,
        after: Option<String>,
    ) -> Result<Connection<CheckContext>, ForgeError> {
        let raw: Connection<GraphQLCommitNode> = self
            .pull_request_connection(
                repo,
                number,
                after,
                "statusCheckRollup: commits(last: 1) { nodes { commit { statusCheckRollup { \
                 contexts(first: 100, after: $endCursor) { nodes { __typename \
                 ... on CheckRun { name status conclusion } \
                 ... on StatusContext { context state } } \
                 pageInfo { hasNextPage endCursor } totalCount } } } } }",
                "/repository/pullRequest/statusCheckRollup",
            )
            .await?;
        Ok(flatten_status_checks(raw))
    }

    async fn repo_metadata(
        &self,
        repo: &Repo,
        input: RepoMetadataInput,
    ) -> Result<RepoMetadata, ForgeError> {
        if input.is_empty() {
            return Ok(RepoMetadata::default());
        }

        let mut selections = Vec::new();
        if input.assignees || input.reviewers {
            selections.push("assignableUsers(first: 100) { nodes { id login name } }");
        }
        if input.labels {
            selections.push("labels(first: 100) { nodes { id name } }");
        }
        if input.projects {
            selections.push("projectsV2(first: 100) { nodes { id title } }");
        }
        if input.milestones {
            selections.push("milestones(first: 100, states: [OPEN]) { nodes { id number title } }");
        }

        let organization = if input.team_reviewers {
            "organization(login: $owner) { teams(first: 100) { nodes { id slug } } }"
        } else {
            ""
        };

        let query = format!(
            "query RepositoryMetadata($owner: String!, $repo: String!) {{
                repository(owner: $owner, name: $repo) {{ id {} }}
                {}
            }}",
            selections.join("\n"),
            organization
        );

        let raw: GraphQLMetadata = serde_json::from_value(
            self.graphql(&query, Self::repo_variables(repo)).await?,
        )
        .map_err(|e| ForgeError::ApiError {
            status: 200,
            message: format!("Failed to parse GraphQL response: {}", e),
        })?;

        let repository = raw.repository.unwrap_or_default();
        Ok(RepoMetadata {
            assignable_users: repository.assignable_users.nodes,
            labels: repository.labels.nodes,
            teams: raw.organization.map(|o| o.teams.nodes).unwrap_or_default(),
            projects: repository.projects_v2.nodes,
            milestones: repository.milestones.nodes,
        })
    }

    async fn create_pull_request(
        &self,
        repo: &Repository,
        input: CreatePullRequestInput,
    ) -> Result<PullRequest, ForgeError> {
        let create = json!({
            "repositoryId": repo.id,
            "baseRefName": input.base_ref_name,
            "headRefName": input.head_ref_name,
            "title": input.title,
            "body": input.body,
            "draft": input.draft,
            "maintainerCanModify": input.maintainer_can_modify,
        });

        let raw: GraphQLPullRequest = self
            .graphql_at(
                "mutation PullRequestCreate($input: CreatePullRequestInput!) {
                    createPullRequest(input: $input) { pullRequest { id number url } }
                }",
                json!({ "input": create }),
                "/createPullRequest/pullRequest",
            )
            .await?;
        let pr: PullRequest = raw.into();

        let has_metadata = !input.label_ids.is_empty()
            || !input.assignee_ids.is_empty()
            || input.milestone_id.is_some();
        if has_metadata {
            let update = json!({
                "pullRequestId": pr.id,
                "labelIds": input.label_ids,
                "assigneeIds": input.assignee_ids,
                "milestoneId": input.milestone_id,
            });
            self.graphql(
                "mutation PullRequestCreateMetadata($input: UpdatePullRequestInput!) {
                    updatePullRequest(input: $input) { clientMutationId }
                }",
                json!({ "input": update }),
            )
            .await?;
        }

        if !input.project_ids.is_empty() {
            let changes = ProjectItemChanges {
                add: input
                    .project_ids
                    .iter()
                    .map(|p| (p.clone(), pr.id.clone()))
                    .collect(),
                remove: Vec::new(),
            };
            self.update_project_items(&repo.repo, changes).await?;
        }

        if !input.reviewers.is_empty() {
            self.request_reviews(&repo.repo, pr.number, input.reviewers)
                .await?;
        }

        Ok(pr)
    }

    async fn update_pull_request(
        &self,
        _repo: &Repo,
        input: UpdatePullRequestInput,
    ) -> Result<(), ForgeError> {
        let mut params = json!({ "pullRequestId": input.pull_request_id });
        if let Some(title) = input.title {
            params["title"] = json!(title);
        }
        if let Some(body) = input.body {
            params["body"] = json!(body);
        }
        if let Some(base) = input.base_ref_name {
            params["baseRefName"] = json!(base);
        }
        if let Some(assignees) = input.assignee_ids {
            params["assigneeIds"] = json!(assignees);
        }
        if let Some(milestone) = input.milestone_id {
            params["milestoneId"] = json!(milestone);
        }

        self.graphql(
            "mutation PullRequestUpdate($input: UpdatePullRequestInput!) {
                updatePullRequest(input: $input) { clientMutationId }
            }",
            json!({ "input": params }),
        )
        .await?;
        Ok(())
    }

    async fn add_labels(
        &self,
        _repo: &Repo,
        pull_request_id: &str,
        label_ids: &[String],
    ) -> Result<(), ForgeError> {
        self.graphql(
            "mutation LabelAdd($input: AddLabelsToLabelableInput!) {
                addLabelsToLabelable(input: $input) { clientMutationId }
            }",
            json!({ "input": { "labelableId": pull_request_id, "labelIds": label_ids } }),
        )
        .await?;
        Ok(())
    }

    async fn remove_labels(
        &self,
        _repo: &Repo,
        pull_request_id: &str,
        label_ids: &[String],
    ) -> Result<(), ForgeError> {
        self.graphql(
            "mutation LabelRemove($input: RemoveLabelsFromLabelableInput!) {
                removeLabelsFromLabelable(input: $input) { clientMutationId }
            }",
            json!({ "input": { "labelableId": pull_request_id, "labelIds": label_ids } }),
        )
        .await?;
        Ok(())
    }

    async fn update_project_items(
        &self,
        _repo: &Repo,
        changes: ProjectItemChanges,
    ) -> Result<(), ForgeError> {
        if changes.add.is_empty() && changes.remove.is_empty() {
            return Ok(());
        }

        let mut mutations = Vec::new();
        let mut variables = serde_json::Map::new();
        for (i, (project_id, content_id)) in changes.add.iter().enumerate() {
            mutations.push(format!(
                "add_{i:03}: addProjectV2ItemById(input: $add_{i:03}) {{ item {{ id }} }}"
            ));
            variables.insert(
                format!("add_{i:03}"),
                json!({ "projectId": project_id, "contentId": content_id }),
            );
        }
        for (i, (project_id, item_id)) in changes.remove.iter().enumerate() {
            mutations.push(format!(
                "delete_{i:03}: deleteProjectV2Item(input: $delete_{i:03}) {{ deletedItemId }}"
            ));
            variables.insert(
                format!("delete_{i:03}"),
                json!({ "projectId": project_id, "itemId": item_id }),
            );
        }

        let declarations: Vec<String> = variables
            .keys()
            .map(|name| {
                let ty = if name.starts_with("add_") {
                    "AddProjectV2ItemByIdInput!"
                } else {
                    "DeleteProjectV2ItemInput!"
                };
                format!("${name}: {ty}")
            })
            .collect();

        let query = format!(
            "mutation UpdateProjectV2Items({}) {{ {} }}",
            declarations.join(", "),
            mutations.join("\n")
        );
        self.graphql(&query, Value::Object(variables)).await?;
        Ok(())
    }

    async fn request_reviews(
        &self,
        repo: &Repo,
        number: u64,
        reviewers: Reviewers,
    ) -> Result<(), ForgeError> {
        if reviewers.is_empty() {
            return Ok(());
        }
        let url = self.repo_url(repo, &format!("pulls/{}/requested_reviewers", number));
        let body = serde_json::to_value(RequestReviewersBody::from(&reviewers))
            .map_err(|e| ForgeError::ApiError {
                status: 0,
                message: e.to_string(),
            })?;
        self.rest_empty(Method::POST, &url, Some(&body)).await
    }

    async fn remove_reviews(
        &self,
        repo: &Repo,
        number: u64,
        reviewers: Reviewers,
    ) -> Result<(), ForgeError> {
        if reviewers.is_empty() {
            return Ok(());
        }
        let url = self.repo_url(repo, &format!("pulls/{}/requested_reviewers", number));
        let body = serde_json::to_value(RequestReviewersBody::from(&reviewers))
            .map_err(|e| ForgeError::ApiError {
                status: 0,
                message: e.to_string(),
            })?;
        self.rest_empty(Method::DELETE, &url, Some(&body)).await
    }

    async fn workflow_run(
        &self,
        repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<WorkflowRun, ForgeError> {
        let path = match attempt {
            Some(n) => format!("actions/runs/{run_id}/attempts/{n}"),
            None => format!("actions/runs/{run_id}"),
        };
        self.rest(Method::GET, &self.repo_url(repo, &path), None)
            .await
    }

    async fn run_jobs(
        &self,
        repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<Vec<Job>, ForgeError> {
        let base = match attempt {
            Some(n) => format!("actions/runs/{run_id}/attempts/{n}/jobs"),
            None => format!("actions/runs/{run_id}/jobs"),
        };

        let mut jobs = Vec::new();
        let mut page = 1;
        loop {
            let url = self.repo_url(repo, &format!("{base}?per_page=100&page={page}"));
            let payload: JobsPayload = self.rest(Method::GET, &url, None).await?;
            let fetched = payload.jobs.len();
            jobs.extend(payload.jobs);
            if fetched == 0 || jobs.len() as u64 >= payload.total_count {
                break;
            }
            page += 1;
        }
        Ok(jobs)
    }

    async fn job(&self, repo: &Repo, job_id: u64) -> Result<Job, ForgeError> {
        let url = self.repo_url(repo, &format!("actions/jobs/{job_id}"));
        self.rest(Method::GET, &url, None).await
    }

    async fn run_log_archive(
        &self,
        repo: &Repo,
        run_id: u64,
        attempt: Option<u64>,
    ) -> Result<Vec<u8>, ForgeError> {
        let path = match attempt {
            Some(n) => format!("actions/runs/{run_id}/attempts/{n}/logs"),
            None => format!("actions/runs/{run_id}/logs"),
        };
        self.rest_bytes(&self.repo_url(repo, &path))
            .await
            .map_err(|e| match e {
                ForgeError::NotFound(_) => ForgeError::NotFound("log not found".into()),
                other => other,
            })
    }

    async fn job_log(&self, repo: &Repo, job_id: u64) -> Result<String, ForgeError> {
        let url = self.repo_url(repo, &format!("actions/jobs/{job_id}/logs"));
        let bytes = self.rest_bytes(&url).await.map_err(|e| match e {
            ForgeError::NotFound(_) => ForgeError::NotFound("log not found".into()),
            other => other,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// GraphQL response envelope.
#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

/// GraphQL error format.
#[derive(Deserialize)]
struct GraphQLError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginNode {
    login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameNode {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLRepository {
    #[serde(default)]
    id: String,
    name: String,
    owner: LoginNode,
    default_branch_ref: Option<NameNode>,
    viewer_permission: Option<String>,
    #[serde(default)]
    parent: Option<GraphQLParent>,
}

#[derive(Debug, Deserialize)]
struct GraphQLParent {
    name: String,
    owner: LoginNode,
}

#[derive(Debug, Deserialize)]
struct RestRepository {
    node_id: String,
    name: String,
    owner: LoginNode,
    #[serde(default)]
    default_branch: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GraphQLBranchPullRequests {
    pull_requests: Connection<GraphQLPullRequest>,
    default_branch_ref: Option<NameNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GraphQLPullRequest {
    id: String,
    number: u64,
    url: String,
    title: String,
    body: String,
    state: PrState,
    is_draft: bool,
    base_ref_name: String,
    head_ref_name: String,
    is_cross_repository: bool,
    head_repository_owner: Option<LoginNode>,
    author: Option<LoginNode>,
    labels: Connection<Label>,
    assignees: Connection<Actor>,
    review_requests: Connection<ReviewRequestNode>,
    milestone: Option<Milestone>,
    project_items: Connection<ProjectItem>,
    reviews: Connection<Review>,
    comments: Connection<Comment>,
    closing_issues_references: Connection<IssueRef>,
    status_check_rollup: Connection<GraphQLCommitNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReviewRequestNode {
    requested_reviewer: Option<RequestedReviewer>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum RequestedReviewer {
    User { login: String },
    Team { slug: String, organization: LoginNode },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphQLCommitNode {
    commit: GraphQLCommit,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GraphQLCommit {
    status_check_rollup: Option<GraphQLRollup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphQLRollup {
    contexts: Connection<GraphQLCheckContext>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum GraphQLCheckContext {
    CheckRun {
        name: String,
        status: String,
        conclusion: Option<String>,
    },
    StatusContext {
        context: String,
        state: String,
    },
}

impl From<GraphQLCheckContext> for CheckContext {
    fn from(raw: GraphQLCheckContext) -> Self {
        match raw {
            GraphQLCheckContext::CheckRun {
                name,
                status,
                conclusion,
            } => CheckContext {
                name,
                status,
                conclusion,
            },
            GraphQLCheckContext::StatusContext { context, state } => CheckContext {
                name: context,
                status: "COMPLETED".into(),
                conclusion: Some(state),
            },
        }
    }
}

fn flatten_status_checks(raw: Connection<GraphQLCommitNode>) -> Connection<CheckContext> {
    let contexts = raw
        .nodes
        .into_iter()
        .next()
        .and_then(|node| node.commit.status_check_rollup)
        .map(|rollup| rollup.contexts)
        .unwrap_or_default();

    Connection {
        nodes: contexts.nodes.into_iter().map(CheckContext::from).collect(),
        total_count: contexts.total_count,
        page_info: contexts.page_info,
    }
}

impl From<GraphQLPullRequest> for PullRequest {
    fn from(raw: GraphQLPullRequest) -> Self {
        let review_requests = raw
            .review_requests
            .nodes
            .into_iter()
            .filter_map(|node| match node.requested_reviewer? {
                RequestedReviewer::User { login } => Some(login),
                RequestedReviewer::Team { slug, organization } => {
                    Some(format!("{}/{}", organization.login, slug))
                }
                RequestedReviewer::Other => None,
            })
            .collect();

        PullRequest {
            id: raw.id,
            number: raw.number,
            url: raw.url,
            title: raw.title,
            body: raw.body,
            state: raw.state,
            is_draft: raw.is_draft,
            base_ref_name: raw.base_ref_name,
            head_ref_name: raw.head_ref_name,
            is_cross_repository: raw.is_cross_repository,
            head_repository_owner: raw
                .head_repository_owner
                .map(|o| o.login)
                .unwrap_or_default(),
            author: raw.author.map(|a| a.login).unwrap_or_default(),
            labels: raw.labels.nodes,
            assignees: raw.assignees.nodes,
            review_requests,
            milestone: raw.milestone,
            project_items: raw.project_items.nodes,
            reviews: raw.reviews,
            comments: raw.comments,
            closing_issues_references: raw.closing_issues_references,
            status_checks: flatten_status_checks(raw.status_check_rollup),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphQLMetadata {
    repository: Option<GraphQLMetadataRepository>,
    organization: Option<GraphQLOrganization>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GraphQLMetadataRepository {
    assignable_users: Connection<Actor>,
    labels: Connection<Label>,
    projects_v2: Connection<Project>,
    milestones: Connection<Milestone>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphQLOrganization {
    teams: Connection<Team>,
}

#[derive(Debug, Deserialize)]
struct JobsPayload {
    total_count: u64,
    jobs: Vec<Job>,
}

/// Request body for requesting or removing reviewers.
#[derive(Serialize)]
struct RequestReviewersBody<'a> {
    reviewers: &'a [String],
    team_reviewers: &'a [String],
}

impl<'a> From<&'a Reviewers> for RequestReviewersBody<'a> {
    fn from(reviewers: &'a Reviewers) -> Self {
        Self {
            reviewers: &reviewers.users,
            team_reviewers: &reviewers.teams,
        }
    }
}
