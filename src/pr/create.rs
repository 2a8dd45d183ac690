//! pr::create
//!
//! `ghr pr create`: work out the head and base of a new pull request,
//! push the head if needed, and open the pull request.
//!
//! # Head resolution
//!
//! With `--head` the head is taken literally and nothing is pushed.
//! Otherwise the current branch is inspected:
//!
//! 1. If the branch's push target resolves to a known remote whose
//!    tracking ref is at `HEAD`, the branch is already pushed there.
//! 2. Otherwise every remote is checked for `refs/remotes/<remote>/<branch>`
//!    at `HEAD`; the first match (in remote order) is used. Each candidate
//!    ref is resolved on its own, so a missing ref never hides the rest.
//! 3. Otherwise the user is asked where to push: a writable remote, an
//!    existing fork, a new fork, or nowhere. Without a terminal this is an
//!    error.
//!
//! # Pushing
//!
//! A new fork is created through the forge and added as a remote. When
//! `origin` is the base repository it becomes `upstream` and the fork
//! takes over `origin`. A fork is not always ready to accept pushes right
//! away, so pushes to a fresh fork are retried on a fixed delay
//! ([`RetryPolicy`]); other push failures are reported immediately.
//!
//! # Example
//!
//! ```ignore
//! use ghr::pr::create::{create_run, CreateEnv, CreateOptions};
//!
//! let opts = CreateOptions { fill: true, ..Default::default() };
//! create_run(&env, &opts).await?;
//! ```

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, warn};
use url::Url;

use super::finder::{FindOptions, PrFinder};
use super::state::{preserve_input, IssueMetadataState};
use super::templates::TemplateManager;
use crate::cli::CliError;
use crate::core::editable::{partition_users_and_teams, ME, NO_MILESTONE};
use crate::core::refs::{
    try_determine_default_pr_head, CachedBranchConfigGitConfigClient, QualifiedHeadRef,
    RemoteToRepoResolver,
};
use crate::core::remotes::{Remote, Remotes};
use crate::core::types::{format_remote_url, web_url, GitProtocol, Repo};
use crate::forge::{CreatePullRequestInput, Forge, PrState, RepoMetadataInput, Repository};
use crate::git::{BranchConfig, GitClient, GitError, RemoteTrackingRef};
use crate::ui::browser::Browser;
use crate::ui::output::IoStreams;
use crate::ui::prompts::{PromptError, Prompter};

/// Longest URL a browser is trusted to open.
const MAX_URL_LENGTH: usize = 8192;

const SKIP_PUSH_OPTION: &str = "Skip pushing the branch";
const CANCEL_OPTION: &str = "Cancel";

/// Flags of `ghr pr create`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// `Some` when `--title` was given, even if empty.
    pub title: Option<String>,
    /// `Some` when `--body` was given or `--body-file` was read.
    pub body: Option<String>,
    /// `-` reads standard input.
    pub body_file: Option<String>,
    pub base_branch: Option<String>,
    pub head_branch: Option<String>,
    pub draft: bool,
    pub web: bool,
    pub editor: bool,
    pub fill: bool,
    pub fill_first: bool,
    pub fill_verbose: bool,
    pub reviewers: Vec<String>,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub projects: Vec<String>,
    pub milestone: Option<String>,
    pub no_maintainer_edit: bool,
    pub recover_file: Option<PathBuf>,
    pub template: Option<String>,
    pub dry_run: bool,
}

impl CreateOptions {
    fn autofill(&self) -> bool {
        self.fill || self.fill_first || self.fill_verbose
    }

    /// Reject flag combinations before touching git or the network.
    ///
    /// Reads `--body-file` into `body`.
    pub fn validate_flags(&mut self, io: &IoStreams, stdin: &mut dyn Read) -> Result<()> {
        let flag_error = |message: &str| -> anyhow::Error { CliError::Flag(message.into()).into() };

        if !io.can_prompt() && self.recover_file.is_some() {
            return Err(flag_error(
                "`--recover` only supported when running interactively",
            ));
        }
        if self.draft && self.web {
            return Err(flag_error("the `--draft` flag is not supported with `--web`"));
        }
        if !self.reviewers.is_empty() && self.web {
            return Err(flag_error("the `--reviewer` flag is not supported with `--web`"));
        }
        if self.no_maintainer_edit && self.web {
            return Err(flag_error(
                "the `--no-maintainer-edit` flag is not supported with `--web`",
            ));
        }
        if self.fill && self.fill_first {
            return Err(flag_error("`--fill` is not supported with `--fill-first`"));
        }
        if self.fill_verbose && self.fill_first {
            return Err(flag_error("`--fill-verbose` is not supported with `--fill-first`"));
        }
        if self.fill_verbose && self.fill {
            return Err(flag_error("`--fill-verbose` is not supported with `--fill`"));
        }
        if self.editor && self.web {
            return Err(flag_error("specify only one of `--editor` or `--web`"));
        }
        if self.editor && !io.can_prompt() {
            return Err(flag_error("`--editor` is not supported in non-tty mode"));
        }

        if let Some(path) = &self.body_file {
            let body = if path == "-" {
                let mut buf = String::new();
                stdin.read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(path)
                    .map_err(|e| anyhow!("failed to read file {path}: {e}"))?
            };
            self.body = Some(body);
        }

        if self.template.is_some() && self.body.is_some() {
            return Err(flag_error(
                "`--template` is not supported when using `--body` or `--body-file`",
            ));
        }
        if !io.can_prompt()
            && !self.web
            && !self.autofill()
            && (self.title.is_none() || self.body.is_none())
        {
            return Err(flag_error(
                "must provide `--title` and `--body` (or `--fill` or `fill-first` or `--fillverbose`) when not running interactively",
            ));
        }
        if self.dry_run && self.web {
            return Err(flag_error("`--dry-run` is not supported when using `--web`"));
        }
        Ok(())
    }
}

/// Spacing of push attempts to a freshly created fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// A single attempt.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// The repository and branch a pull request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRefs {
    pub repo: Repository,
    pub branch: String,
}

/// Where the head of the new pull request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationRefs {
    /// The head already exists on the forge.
    SkipPush {
        base: BaseRefs,
        head: QualifiedHeadRef,
    },
    /// The head is pushed to a repository the user can write to.
    Pushable {
        base: BaseRefs,
        head_repo: Repo,
        head_branch: String,
    },
    /// The base repository is forked and the head pushed to the fork.
    Forkable {
        base: BaseRefs,
        head: QualifiedHeadRef,
    },
}

impl CreationRefs {
    fn base(&self) -> &BaseRefs {
        match self {
            CreationRefs::SkipPush { base, .. }
            | CreationRefs::Pushable { base, .. }
            | CreationRefs::Forkable { base, .. } => base,
        }
    }

    pub fn base_repo(&self) -> &Repository {
        &self.base().repo
    }

    pub fn base_ref(&self) -> &str {
        &self.base().branch
    }

    /// `owner:branch` when the head lives outside the base repository.
    pub fn qualified_head_ref(&self) -> String {
        match self {
            CreationRefs::SkipPush { head, .. } | CreationRefs::Forkable { head, .. } => {
                head.to_string()
            }
            CreationRefs::Pushable {
                base,
                head_repo,
                head_branch,
            } => {
                if head_repo.is_same(&base.repo.repo) {
                    head_branch.clone()
                } else {
                    format!("{}:{}", head_repo.owner(), head_branch)
                }
            }
        }
    }

    pub fn unqualified_head_ref(&self) -> &str {
        match self {
            CreationRefs::SkipPush { head, .. } | CreationRefs::Forkable { head, .. } => {
                head.branch()
            }
            CreationRefs::Pushable { head_branch, .. } => head_branch,
        }
    }
}

/// Resolved refs plus the local remotes they were resolved against.
#[derive(Debug, Clone)]
pub struct CreateContext {
    pub remotes: Remotes,
    pub refs: CreationRefs,
    /// `<remote>/<base>` when the base repository has a local remote.
    pub base_tracking_branch: String,
}

impl CreateContext {
    fn new(remotes: Remotes, refs: CreationRefs) -> Self {
        let base_tracking_branch = match remote_for_repo(&remotes, &refs.base_repo().repo) {
            Some(remote) => format!("{}/{}", remote.name, refs.base_ref()),
            None => refs.base_ref().to_string(),
        };
        Self {
            remotes,
            refs,
            base_tracking_branch,
        }
    }
}

/// Collaborators of the create command.
pub struct CreateEnv<'a> {
    pub io: &'a IoStreams,
    pub git: &'a dyn GitClient,
    pub forge: &'a dyn Forge,
    pub finder: &'a dyn PrFinder,
    pub prompter: &'a dyn Prompter,
    pub browser: &'a dyn Browser,
    pub git_protocol: GitProtocol,
    pub repo_override: Option<Repo>,
    /// Where interactive input is saved when creation fails.
    pub preserve_dir: PathBuf,
    pub retry: RetryPolicy,
}

/// Next step chosen after composing the pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    SubmitDraft,
    Preview,
    Metadata,
    Cancel,
}

fn remote_for_repo<'r>(remotes: &'r Remotes, repo: &Repo) -> Option<&'r Remote> {
    remotes.iter().find(|r| r.repo.is_same(repo))
}

fn qualify(head_owner: &str, base: &Repo, branch: &str) -> QualifiedHeadRef {
    if head_owner.eq_ignore_ascii_case(base.owner()) {
        QualifiedHeadRef::without_owner(branch)
    } else {
        QualifiedHeadRef::new(head_owner, branch)
    }
}

fn pick_base_branch(opts: &CreateOptions, config: &BranchConfig, base: &Repository) -> String {
    opts.base_branch
        .as_deref()
        .filter(|b| !b.is_empty())
        .or(config.merge_base.as_deref().filter(|b| !b.is_empty()))
        .unwrap_or(&base.default_branch)
        .to_string()
}

fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Resolve the base repository and the head of the pull request.
pub async fn new_create_context(env: &CreateEnv<'_>, opts: &CreateOptions) -> Result<CreateContext> {
    let remotes = match env.git.remotes() {
        Ok(raw) => Remotes::from_git(raw),
        Err(e) if env.repo_override.is_some() => {
            debug!(error = %e, "ignoring remotes with explicit repository");
            Remotes::default()
        }
        Err(e) => return Err(e.into()),
    };
    let base_repo = remotes.resolve_base_repo(env.repo_override.as_ref())?;
    let base_repo = env.forge.repository(&base_repo).await?;

    if let Some(head) = opts.head_branch.as_deref().filter(|h| !h.is_empty()) {
        let head = QualifiedHeadRef::parse(head)?;
        let config = env.git.read_branch_config(head.branch())?;
        let branch = pick_base_branch(opts, &config, &base_repo);
        let refs = CreationRefs::SkipPush {
            base: BaseRefs {
                repo: base_repo,
                branch,
            },
            head,
        };
        return Ok(CreateContext::new(remotes, refs));
    }

    if let Ok(count) = env.git.uncommitted_change_count() {
        if count > 0 {
            writeln!(
                env.io.err(),
                "Warning: {}",
                pluralize(count, "uncommitted change")
            )?;
        }
    }

    let current = env
        .git
        .current_branch()
        .map_err(|e| anyhow!("could not determine the current branch: {e}"))?;
    let config = env.git.read_branch_config(&current)?;
    let base = BaseRefs {
        branch: pick_base_branch(opts, &config, &base_repo),
        repo: base_repo,
    };

    let resolver = RemoteToRepoResolver::new(&remotes);
    let cached = CachedBranchConfigGitConfigClient::new(env.git.config_client(), config);
    let default_head = try_determine_default_pr_head(&cached, &resolver, &current)?;

    let pushed = pushed_to_push_target(
        env.git,
        &remotes,
        &base.repo.repo,
        default_head.repo.as_ref(),
        &default_head.branch,
    );
    if let Some(head) = pushed {
        info!(head = %head, "branch is up to date with its push target");
        return Ok(CreateContext::new(remotes, CreationRefs::SkipPush { base, head }));
    }

    if let Some(head) = pushed_to_any_remote(env.git, &remotes, &base.repo.repo, &current)? {
        info!(head = %head, "branch is up to date with a remote");
        return Ok(CreateContext::new(remotes, CreationRefs::SkipPush { base, head }));
    }

    if !env.io.can_prompt() {
        writeln!(
            env.io.err(),
            "aborted: you must first push the current branch to a remote, or use the --head flag"
        )?;
        return Err(CliError::Silent.into());
    }

    let refs = prompt_push_target(env, &remotes, base, current).await?;
    Ok(CreateContext::new(remotes, refs))
}

/// The push target's tracking ref, when it is at `HEAD`.
fn pushed_to_push_target(
    git: &dyn GitClient,
    remotes: &Remotes,
    base: &Repo,
    head_repo: Option<&Repo>,
    branch: &str,
) -> Option<QualifiedHeadRef> {
    let head_repo = head_repo?;
    let remote = remote_for_repo(remotes, head_repo)?;
    let lookup = [
        "HEAD".to_string(),
        format!("refs/remotes/{}/{}", remote.name, branch),
    ];
    let resolved = git.show_refs(&lookup).ok()?;
    match resolved.as_slice() {
        [head, tracking] if head.name == "HEAD" && head.hash == tracking.hash => {
            Some(qualify(head_repo.owner(), base, branch))
        }
        _ => None,
    }
}

/// The first remote whose copy of `branch` is at `HEAD`.
fn pushed_to_any_remote(
    git: &dyn GitClient,
    remotes: &Remotes,
    base: &Repo,
    branch: &str,
) -> Result<Option<QualifiedHeadRef>> {
    let mut lookup = vec!["HEAD".to_string()];
    lookup.extend(
        remotes
            .iter()
            .map(|r| format!("refs/remotes/{}/{}", r.name, branch)),
    );

    let resolved = git.show_refs(&lookup).unwrap_or_default();
    let Some((head, candidates)) = resolved.split_first() else {
        return Ok(None);
    };
    if head.name != "HEAD" {
        return Ok(None);
    }
    let Some(matching) = candidates.iter().find(|r| r.hash == head.hash) else {
        return Ok(None);
    };

    let tracking = RemoteTrackingRef::parse(&matching.name)?;
    let remote = remotes.find_by_name(&[tracking.remote.as_str()])?;
    Ok(Some(qualify(remote.repo.owner(), base, &tracking.branch)))
}

/// Remote repositories the viewer can push to, in remote order.
async fn writable_remote_repos(forge: &dyn Forge, remotes: &Remotes) -> Result<Vec<Repository>> {
    let fetched =
        futures::future::try_join_all(remotes.iter().map(|r| forge.repository(&r.repo))).await?;
    let mut writable: Vec<Repository> = Vec::new();
    for repo in fetched {
        if repo.viewer_can_push() && !writable.iter().any(|w| w.repo.is_same(&repo.repo)) {
            writable.push(repo);
        }
    }
    Ok(writable)
}

async fn prompt_push_target(
    env: &CreateEnv<'_>,
    remotes: &Remotes,
    base: BaseRefs,
    current: String,
) -> Result<CreationRefs> {
    let mut pushable = writable_remote_repos(env.forge, remotes).await?;
    if pushable.is_empty() {
        pushable = env.forge.repo_forks(&base.repo.repo, 3).await?;
    }
    let login = env.forge.current_login().await?;

    let mut options: Vec<String> = pushable.iter().map(|r| r.repo.full_name()).collect();
    let has_own_fork = pushable
        .iter()
        .any(|r| r.repo.owner().eq_ignore_ascii_case(&login));
    if !has_own_fork {
        options.push(format!("Create a fork of {}", base.repo.repo.full_name()));
    }
    options.push(SKIP_PUSH_OPTION.to_string());
    options.push(CANCEL_OPTION.to_string());

    let picked = env.prompter.select(
        &format!("Where should we push the '{current}' branch?"),
        None,
        &options,
    )?;

    if let Some(repo) = pushable.get(picked) {
        return Ok(CreationRefs::Pushable {
            base,
            head_repo: repo.repo.clone(),
            head_branch: current,
        });
    }
    match options.get(picked).map(String::as_str) {
        Some(SKIP_PUSH_OPTION) => Ok(CreationRefs::SkipPush {
            base,
            head: QualifiedHeadRef::without_owner(current),
        }),
        Some(CANCEL_OPTION) => Err(CliError::Cancel.into()),
        _ => Ok(CreationRefs::Forkable {
            base,
            head: QualifiedHeadRef::new(login, current),
        }),
    }
}

/// `fix-the_thing` becomes `fix the thing`.
pub fn humanize(s: &str) -> String {
    s.chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect()
}

fn indent(text: &str) -> String {
    text.split('\n')
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Title and body from the commits between the base and the head.
///
/// One commit (or `use_first_commit`) gives that commit's message; several
/// give the humanized branch name and a list of commit titles, oldest
/// first, each followed by its indented body when `add_body` is set.
pub fn init_default_title_body(
    git: &dyn GitClient,
    ctx: &CreateContext,
    state: &mut IssueMetadataState,
    use_first_commit: bool,
    add_body: bool,
) -> Result<(), GitError> {
    let commits = git.commits(&ctx.base_tracking_branch, ctx.refs.unqualified_head_ref())?;

    if let Some(oldest) = commits.last().filter(|_| commits.len() == 1 || use_first_commit) {
        state.title = oldest.title.clone();
        state.body = oldest.body.clone();
        return Ok(());
    }

    state.title = humanize(ctx.refs.unqualified_head_ref());
    let mut body = String::new();
    for (i, commit) in commits.iter().enumerate().rev() {
        body.push_str(&format!("- **{}**\n", commit.title));
        if add_body {
            body.push_str(&indent(&commit.body));
            if i > 0 {
                body.push_str("\n\n");
            }
        }
    }
    state.body = body;
    Ok(())
}

/// Replace `@me` with the viewer's login.
async fn replace_me(forge: &dyn Forge, logins: &[String]) -> Result<Vec<String>> {
    if !logins.iter().any(|l| l == ME) {
        return Ok(logins.to_vec());
    }
    let me = forge.current_login().await?;
    Ok(logins
        .iter()
        .map(|l| if l == ME { me.clone() } else { l.clone() })
        .collect())
}

/// Initial state from flags and commit defaults.
pub async fn new_issue_state(
    env: &CreateEnv<'_>,
    ctx: &CreateContext,
    opts: &CreateOptions,
) -> Result<IssueMetadataState> {
    let mut state = IssueMetadataState {
        reviewers: opts.reviewers.clone(),
        assignees: replace_me(env.forge, &opts.assignees).await?,
        labels: opts.labels.clone(),
        project_titles: opts.projects.clone(),
        milestones: opts
            .milestone
            .iter()
            .filter(|m| !m.is_empty())
            .cloned()
            .collect(),
        draft: opts.draft,
        ..Default::default()
    };

    if opts.autofill() || opts.title.is_none() || opts.body.is_none() {
        let filled = init_default_title_body(
            env.git,
            ctx,
            &mut state,
            opts.fill_first,
            opts.fill_verbose,
        );
        if let Err(e) = filled {
            if opts.autofill() {
                bail!("could not compute title or body defaults: {e}");
            }
            debug!(error = %e, "no title or body defaults");
        }
    }
    Ok(state)
}

/// Run `ghr pr create`.
pub async fn create_run(env: &CreateEnv<'_>, opts: &CreateOptions) -> Result<()> {
    let ctx = new_create_context(env, opts).await?;
    let mut state = new_issue_state(env, &ctx, opts).await?;

    if opts.web {
        if !(opts.fill || opts.fill_first) {
            state.title = opts.title.clone().unwrap_or_default();
            state.body = opts.body.clone().unwrap_or_default();
        }
        if let Some(template) = &opts.template {
            state.template = template.clone();
        }
        handle_push(env, &ctx).await?;
        let url = generate_compare_url(&ctx, &state)?;
        if !valid_url(&url) {
            bail!("cannot open in browser: maximum URL length exceeded");
        }
        return preview_pr(env, &url);
    }

    if let Some(title) = &opts.title {
        state.title = title.clone();
    }
    if let Some(body) = &opts.body {
        state.body = body.clone();
    }

    let head = ctx.refs.qualified_head_ref();
    let existing = FindOptions::new(head.clone(), &["url"])
        .with_base_branch(ctx.refs.base_ref())
        .with_states(&[PrState::Open]);
    match env.finder.find(existing).await {
        Ok((pr, _)) => bail!(
            "a pull request for branch \"{}\" into branch \"{}\" already exists:\n{}",
            head,
            ctx.refs.base_ref(),
            pr.url
        ),
        Err(e) if e.is_not_found() => {}
        Err(e) => bail!("error checking for existing pull request: {e}"),
    }

    if env.io.can_prompt() {
        let verb = if opts.dry_run {
            "Dry Running pull request"
        } else if state.draft {
            "Creating draft pull request"
        } else {
            "Creating pull request"
        };
        write!(
            env.io.err(),
            "\n{} for {} into {} in {}\n\n",
            verb,
            env.io.bold(&head),
            env.io.bold(ctx.refs.base_ref()),
            ctx.refs.base_repo().repo.full_name()
        )?;
    }

    let both_provided = opts.title.is_some() && opts.body.is_some();
    if !opts.editor && (opts.autofill() || both_provided) {
        handle_push(env, &ctx).await?;
        return submit_pr(env, opts, &ctx, &mut state).await;
    }

    if let Some(path) = &opts.recover_file {
        state
            .fill_from_json(path)
            .map_err(|e| anyhow!("failed to recover input: {e}"))?;
    }

    let templates = match env.git.repo_dir() {
        Ok(dir) => TemplateManager::new(dir),
        Err(e) => {
            debug!(error = %e, "no working tree for templates");
            TemplateManager::new(PathBuf::new())
        }
    };

    let (action, open_url) = if opts.editor {
        if let Some(name) = &opts.template {
            state.body = templates.select(name)?.body;
        }
        let (title, body) = titled_edit_survey(env.prompter, &state.title, &state.body)?;
        if title.is_empty() {
            bail!("title can't be blank");
        }
        state.title = title;
        state.body = body;
        handle_push(env, &ctx).await?;
        let action = if opts.draft {
            Action::SubmitDraft
        } else {
            Action::Submit
        };
        (action, String::new())
    } else {
        if opts.title.is_none() {
            title_survey(env.prompter, &mut state)?;
        }
        let prepared = compose_and_push(env, opts, &ctx, &templates, &mut state).await;
        match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                preserve_input(env.io, &state, &env.preserve_dir);
                return Err(e);
            }
        }
    };

    match action {
        Action::Preview => preview_pr(env, &open_url),
        Action::SubmitDraft => {
            state.draft = true;
            submit_pr(env, opts, &ctx, &mut state).await
        }
        Action::Submit => submit_pr(env, opts, &ctx, &mut state).await,
        Action::Metadata | Action::Cancel => bail!("expected to cancel, preview, or submit"),
    }
}

/// Body, confirmation and push of the interactive flow.
async fn compose_and_push(
    env: &CreateEnv<'_>,
    opts: &CreateOptions,
    ctx: &CreateContext,
    templates: &TemplateManager,
    state: &mut IssueMetadataState,
) -> Result<(Action, String)> {
    if opts.body.is_none() {
        let mut template_body = String::new();
        if opts.recover_file.is_none() {
            let template = match &opts.template {
                Some(name) => Some(templates.select(name)?),
                None => templates.choose(env.prompter)?,
            };
            if let Some(template) = template {
                template_body = template.body;
            }
        }
        body_survey(env.prompter, state, &template_body)?;
    }

    let open_url = generate_compare_url(ctx, state)?;

    let allow_preview = !state.has_metadata() && valid_url(&open_url) && !opts.dry_run;
    let allow_metadata = ctx.refs.base_repo().viewer_can_triage();
    let mut action = confirm_submission(env.prompter, allow_preview, allow_metadata, state.draft)
        .map_err(|e| anyhow!("unable to confirm: {e}"))?;

    if action == Action::Metadata {
        metadata_survey(env, &ctx.refs.base_repo().repo, state).await?;
        let allow_preview = !state.has_metadata() && !opts.dry_run;
        action = confirm_submission(env.prompter, allow_preview, false, state.draft)?;
    }

    if action == Action::Cancel {
        writeln!(env.io.err(), "Discarding.")?;
        return Err(CliError::Cancel.into());
    }

    handle_push(env, ctx).await?;
    Ok((action, open_url))
}

fn title_survey(prompter: &dyn Prompter, state: &mut IssueMetadataState) -> Result<(), PromptError> {
    let title = prompter.input("Title", &state.title)?;
    if title != state.title {
        state.dirty = true;
    }
    state.title = title;
    Ok(())
}

fn body_survey(
    prompter: &dyn Prompter,
    state: &mut IssueMetadataState,
    template_body: &str,
) -> Result<(), PromptError> {
    if !template_body.is_empty() {
        if state.body.is_empty() {
            state.body = template_body.to_string();
        } else {
            state.body = format!("{}\n\n{}", state.body, template_body);
        }
    }

    let body = prompter.markdown_editor("Body", &state.body, true)?;
    if body != state.body {
        state.dirty = true;
    }
    state.body = body;
    Ok(())
}

/// Edit title and body together: the first line is the title, an
/// optional `---` line follows, the rest is the body.
pub fn titled_edit_survey(
    prompter: &dyn Prompter,
    title: &str,
    body: &str,
) -> Result<(String, String), PromptError> {
    let initial = format!("{title}\n---\n{body}");
    let edited = prompter.markdown_editor("Title and body", &initial, false)?;

    let (title, rest) = edited.split_once('\n').unwrap_or((edited.as_str(), ""));
    let rest = rest
        .strip_prefix("---\n")
        .or_else(|| (rest.trim() == "---").then_some(""))
        .unwrap_or(rest);
    Ok((title.trim().to_string(), rest.trim().to_string()))
}

/// Ask what to do with the composed pull request.
pub fn confirm_submission(
    prompter: &dyn Prompter,
    allow_preview: bool,
    allow_metadata: bool,
    draft: bool,
) -> Result<Action, PromptError> {
    let mut actions = Vec::new();
    if draft {
        actions.push((Action::SubmitDraft, "Submit as draft"));
    } else {
        actions.push((Action::Submit, "Submit"));
        actions.push((Action::SubmitDraft, "Submit as draft"));
    }
    if allow_preview {
        actions.push((Action::Preview, "Continue in browser"));
    }
    if allow_metadata {
        actions.push((Action::Metadata, "Add metadata"));
    }
    actions.push((Action::Cancel, "Cancel"));

    let options: Vec<String> = actions.iter().map(|(_, label)| label.to_string()).collect();
    let picked = prompter.select("What's next?", Some(0), &options)?;
    Ok(actions.get(picked).map_or(Action::Cancel, |(action, _)| *action))
}

/// Ask for reviewers, assignees, labels, projects and a milestone.
async fn metadata_survey(
    env: &CreateEnv<'_>,
    repo: &Repo,
    state: &mut IssueMetadataState,
) -> Result<()> {
    let fields: Vec<String> = ["Reviewers", "Assignees", "Labels", "Projects", "Milestone"]
        .map(String::from)
        .to_vec();
    let picked: Vec<&str> = env
        .prompter
        .multi_select("What would you like to add?", &[], &fields)?
        .into_iter()
        .filter_map(|i| fields.get(i).map(String::as_str))
        .collect();
    let wants = |field: &str| picked.iter().any(|p| *p == field);

    let input = RepoMetadataInput {
        reviewers: wants("Reviewers"),
        team_reviewers: wants("Reviewers"),
        assignees: wants("Reviewers") || wants("Assignees"),
        labels: wants("Labels"),
        projects: wants("Projects"),
        milestones: wants("Milestone"),
    };
    if input.is_empty() {
        return Ok(());
    }
    env.io.progress("Fetching repository metadata...")?;
    let metadata = env.forge.repo_metadata(repo, input).await?;

    let choose = |message: &str, options: Vec<String>, defaults: &[String]| -> Result<Vec<String>> {
        if options.is_empty() {
            return Ok(defaults.to_vec());
        }
        let picked = env.prompter.multi_select(message, defaults, &options)?;
        Ok(picked
            .into_iter()
            .filter_map(|i| options.get(i).cloned())
            .collect())
    };

    if wants("Reviewers") {
        let mut options: Vec<String> = metadata
            .assignable_users
            .iter()
            .map(|u| u.login.clone())
            .collect();
        options.extend(
            metadata
                .teams
                .iter()
                .map(|t| format!("{}/{}", repo.owner(), t.slug)),
        );
        state.reviewers = choose("Reviewers", options, &state.reviewers)?;
    }
    if wants("Assignees") {
        let options = metadata
            .assignable_users
            .iter()
            .map(|u| u.login.clone())
            .collect();
        state.assignees = choose("Assignees", options, &state.assignees)?;
    }
    if wants("Labels") {
        let options = metadata.labels.iter().map(|l| l.name.clone()).collect();
        state.labels = choose("Labels", options, &state.labels)?;
    }
    if wants("Projects") {
        let options = metadata.projects.iter().map(|p| p.title.clone()).collect();
        state.project_titles = choose("Projects", options, &state.project_titles)?;
    }
    if wants("Milestone") && !metadata.milestones.is_empty() {
        let mut options = vec![NO_MILESTONE.to_string()];
        options.extend(metadata.milestones.iter().map(|m| m.title.clone()));
        let picked = env.prompter.select("Milestone", Some(0), &options)?;
        state.milestones = match options.get(picked) {
            Some(title) if title != NO_MILESTONE => vec![title.clone()],
            _ => Vec::new(),
        };
    }

    state.dirty = true;
    Ok(())
}

/// Fork if needed, make sure the head repository has a remote, and push.
pub async fn handle_push(env: &CreateEnv<'_>, ctx: &CreateContext) -> Result<()> {
    let (head_repo, forked) = match &ctx.refs {
        CreationRefs::SkipPush { .. } => return Ok(()),
        CreationRefs::Pushable { head_repo, .. } => (head_repo.clone(), false),
        CreationRefs::Forkable { base, .. } => {
            let fork = env
                .forge
                .fork_repo(&base.repo.repo)
                .await
                .map_err(|e| anyhow!("error forking repo: {e}"))?;
            info!(fork = %fork.repo, "forked base repository");
            (fork.repo, true)
        }
    };

    let remote_name = match remote_for_repo(&ctx.remotes, &head_repo) {
        Some(remote) => remote.name.clone(),
        None => add_head_remote(env, &ctx.refs.base_repo().repo, &head_repo, forked)?,
    };

    let refspec = format!("HEAD:refs/heads/{}", ctx.refs.unqualified_head_ref());
    let policy = if forked { env.retry } else { RetryPolicy::none() };
    push_with_retry(env, &remote_name, &refspec, policy).await
}

/// Add `head_repo` as `origin` (renaming an `origin` that points at the
/// base to `upstream`) or, failing that, as `fork`.
fn add_head_remote(
    env: &CreateEnv<'_>,
    base: &Repo,
    head_repo: &Repo,
    forked: bool,
) -> Result<String> {
    let remotes = Remotes::from_git(env.git.remotes()?);
    let origin = remotes.find_by_name(&["origin"]).ok();
    let has_upstream = remotes.contains_name("upstream");

    let mut name = if origin.is_some() { "fork" } else { "origin" };
    if let Some(origin) = origin {
        if !has_upstream && origin.repo.is_same(base) {
            env.git
                .rename_remote("origin", "upstream")
                .map_err(|e| anyhow!("error renaming origin remote: {e}"))?;
            name = "origin";
            writeln!(
                env.io.err(),
                "Changed {} remote to \"upstream\"",
                base.full_name()
            )?;
        }
    }

    let url = format_remote_url(head_repo, env.git_protocol);
    env.git
        .add_remote(name, &url, &[])
        .map_err(|e| anyhow!("error adding remote: {e}"))?;
    writeln!(
        env.io.err(),
        "Added {} as remote \"{}\"",
        head_repo.full_name(),
        name
    )?;

    if forked {
        env.git
            .set_remote_resolution("upstream", "base")
            .map_err(|e| anyhow!("error setting upstream as default: {e}"))?;
        if env.io.is_stdout_tty() {
            writeln!(
                env.io.err(),
                "! Repository {} set as the default repository",
                env.io.bold(&base.full_name())
            )?;
        }
    }

    Ok(name.to_string())
}

async fn push_with_retry(
    env: &CreateEnv<'_>,
    remote: &str,
    refspec: &str,
    policy: RetryPolicy,
) -> Result<()> {
    let mut retries = 0;
    loop {
        debug!(remote, refspec, attempt = retries + 1, "pushing");
        match env.git.push(remote, refspec) {
            Ok(()) => return Ok(()),
            Err(e) if retries < policy.max_retries => {
                retries += 1;
                warn!(error = %e, retries, "push failed, retrying");
                writeln!(
                    env.io.err(),
                    "waiting {} seconds before retrying...",
                    policy.delay.as_secs()
                )?;
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Whether a browser can be trusted with `url`.
pub fn valid_url(url: &str) -> bool {
    url.len() < MAX_URL_LENGTH
}

/// Web form URL comparing the head with the base, prefilled from `state`.
pub fn generate_compare_url(ctx: &CreateContext, state: &IssueMetadataState) -> Result<String> {
    let mut url = Url::parse(&web_url(&ctx.refs.base_repo().repo, ""))?;
    url.path_segments_mut()
        .map_err(|()| anyhow!("cannot build compare URL"))?
        .pop_if_empty()
        .push("compare")
        .push(&format!(
            "{}...{}",
            ctx.refs.base_ref(),
            ctx.refs.qualified_head_ref()
        ));

    let mut params = std::collections::BTreeMap::new();
    params.insert("expand", "1".to_string());
    if !state.title.is_empty() {
        params.insert("title", state.title.clone());
    }
    params.insert("body", state.body.clone());
    if !state.assignees.is_empty() {
        params.insert("assignees", state.assignees.join(","));
    }
    if !state.template.is_empty() && state.body.is_empty() {
        params.insert("template", state.template.clone());
    }
    if !state.labels.is_empty() {
        params.insert("labels", state.labels.join(","));
    }
    if !state.project_titles.is_empty() {
        params.insert("projects", state.project_titles.join(","));
    }
    if let Some(milestone) = state.milestones.first() {
        params.insert("milestone", milestone.clone());
    }
    url.query_pairs_mut().extend_pairs(params);

    Ok(url.into())
}

fn preview_pr(env: &CreateEnv<'_>, url: &str) -> Result<()> {
    if env.io.is_stdin_tty() && env.io.is_stdout_tty() {
        let display = url.strip_prefix("https://").unwrap_or(url);
        writeln!(env.io.err(), "Opening {display} in your browser.")?;
    }
    env.browser
        .browse(url)
        .map_err(|e| anyhow!("failed to open {url}: {e}"))
}

/// Translate metadata names in `state` into `input`.
async fn add_metadata(
    forge: &dyn Forge,
    repo: &Repo,
    state: &IssueMetadataState,
    input: &mut CreatePullRequestInput,
) -> Result<()> {
    let metadata = forge.repo_metadata(repo, state.metadata_input()).await?;

    input.assignee_ids = metadata
        .members_to_ids(&state.assignees)
        .map_err(|e| anyhow!("could not assign user: {e}"))?;
    input.label_ids = metadata
        .labels_to_ids(&state.labels)
        .map_err(|e| anyhow!("could not add label: {e}"))?;
    input.project_ids = metadata
        .projects_to_ids(&state.project_titles)
        .map_err(|e| anyhow!("could not add to project: {e}"))?;
    if let Some(milestone) = state.milestones.first() {
        let id = metadata
            .milestone_to_id(milestone)
            .map_err(|e| anyhow!("could not add to milestone '{milestone}': {e}"))?;
        input.milestone_id = Some(id);
    }

    let (teams, users): (Vec<String>, Vec<String>) =
        state.reviewers.iter().cloned().partition(|r| r.contains('/'));
    metadata
        .members_to_ids(&users)
        .map_err(|e| anyhow!("could not request reviewer: {e}"))?;
    metadata
        .teams_to_ids(&teams)
        .map_err(|e| anyhow!("could not request reviewer: {e}"))?;
    input.reviewers = partition_users_and_teams(&state.reviewers);
    Ok(())
}

async fn submit_pr(
    env: &CreateEnv<'_>,
    opts: &CreateOptions,
    ctx: &CreateContext,
    state: &mut IssueMetadataState,
) -> Result<()> {
    if state.title.is_empty() {
        bail!("pull request title must not be blank");
    }

    let mut input = CreatePullRequestInput {
        base_ref_name: ctx.refs.base_ref().to_string(),
        head_ref_name: ctx.refs.qualified_head_ref(),
        title: state.title.clone(),
        body: state.body.clone(),
        draft: state.draft,
        maintainer_can_modify: !opts.no_maintainer_edit,
        ..Default::default()
    };
    if state.has_metadata() {
        add_metadata(env.forge, &ctx.refs.base_repo().repo, state, &mut input).await?;
    }

    if opts.dry_run {
        if env.io.is_stdout_tty() {
            render_pull_request_tty(env.io, &input, state)?;
        } else {
            render_pull_request_plain(env.io, &input, state)?;
        }
        return Ok(());
    }

    let pr = env
        .forge
        .create_pull_request(ctx.refs.base_repo(), input)
        .await
        .map_err(|e| anyhow!("pull request create failed: {e}"))?;
    info!(number = pr.number, "created pull request");
    writeln!(env.io.out(), "{}", pr.url)?;
    Ok(())
}

fn metadata_lines(state: &IssueMetadataState) -> Vec<(&'static str, String)> {
    [
        ("labels", &state.labels),
        ("reviewers", &state.reviewers),
        ("assignees", &state.assignees),
        ("milestones", &state.milestones),
        ("projects", &state.project_titles),
    ]
    .into_iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(name, values)| (name, values.join(", ")))
    .collect()
}

fn render_pull_request_plain(
    io: &IoStreams,
    input: &CreatePullRequestInput,
    state: &IssueMetadataState,
) -> std::io::Result<()> {
    let mut out = io.out();
    writeln!(out, "Would have created a Pull Request with:")?;
    writeln!(out, "title:\t{}", input.title)?;
    writeln!(out, "draft:\t{}", input.draft)?;
    writeln!(out, "base:\t{}", input.base_ref_name)?;
    writeln!(out, "head:\t{}", input.head_ref_name)?;
    for (name, values) in metadata_lines(state) {
        writeln!(out, "{name}:\t{values}")?;
    }
    writeln!(out, "maintainerCanModify:\t{}", input.maintainer_can_modify)?;
    writeln!(out, "body:")?;
    if !input.body.is_empty() {
        writeln!(out, "{}", input.body)?;
    }
    Ok(())
}

fn render_pull_request_tty(
    io: &IoStreams,
    input: &CreatePullRequestInput,
    state: &IssueMetadataState,
) -> std::io::Result<()> {
    let mut lines = vec![
        ("Title".to_string(), input.title.clone()),
        ("Draft".to_string(), input.draft.to_string()),
        ("Base".to_string(), input.base_ref_name.clone()),
        ("Head".to_string(), input.head_ref_name.clone()),
    ];
    for (name, values) in metadata_lines(state) {
        let mut label = name.to_string();
        label[..1].make_ascii_uppercase();
        lines.push((label, values));
    }
    lines.push((
        "MaintainerCanModify".to_string(),
        input.maintainer_can_modify.to_string(),
    ));

    let body = if input.body.is_empty() {
        io.muted("No description provided")
    } else {
        input.body.clone()
    };

    let mut out = io.out();
    writeln!(out, "Would have created a Pull Request with:")?;
    for (label, value) in lines {
        writeln!(out, "{}: {}", io.bold(&label), value)?;
    }
    writeln!(out, "{}", io.bold("Body:"))?;
    writeln!(out, "{body}")?;
    Ok(())
}
