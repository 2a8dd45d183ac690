//! cli::commands::pr
//!
//! `ghr pr create`, `ghr pr view` and `ghr pr edit`.
//!
//! # Example
//!
//! ```bash
//! # Create a pull request for the current branch
//! ghr pr create --fill
//!
//! # Show the pull request for a branch
//! ghr pr view feature-branch
//!
//! # Add a label
//! ghr pr edit 23 --add-label bug
//! ```

use std::io::Read;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::cli::args::{CreateArgs, EditArgs, ViewArgs};
use crate::cli::{CliError, Factory};
use crate::core::editable::Editable;
use crate::git::GitClient;
use crate::pr::create::{create_run, CreateEnv, CreateOptions, RetryPolicy};
use crate::pr::edit::{run_edit, EditOptions};
use crate::pr::finder::Finder;
use crate::pr::view::{run_view, ViewOptions};
use crate::ui::output::IoStreams;

/// Translate `pr create` flags.
pub fn create_options(args: CreateArgs) -> CreateOptions {
    CreateOptions {
        title: args.title,
        body: args.body,
        body_file: args.body_file,
        base_branch: args.base,
        head_branch: args.head,
        draft: args.draft,
        web: args.web,
        editor: args.editor,
        fill: args.fill,
        fill_first: args.fill_first,
        fill_verbose: args.fill_verbose,
        reviewers: args.reviewers,
        assignees: args.assignees,
        labels: args.labels,
        projects: args.projects,
        milestone: args.milestone,
        no_maintainer_edit: args.no_maintainer_edit,
        recover_file: args.recover,
        template: args.template,
        dry_run: args.dry_run,
    }
}

fn finder(factory: &Factory) -> Result<Finder> {
    let git: Arc<dyn GitClient> = factory.git()?;
    Ok(Finder::new(git, factory.forge()?, factory.repo_override()?))
}

pub fn create(factory: &Factory, args: CreateArgs) -> Result<()> {
    let mut opts = create_options(args);
    opts.validate_flags(&factory.io, &mut std::io::stdin())?;

    let git = factory.git()?;
    let forge = factory.forge()?;
    let finder = finder(factory)?;
    let prompter = factory.prompter();
    let browser = factory.browser();
    let env = CreateEnv {
        io: &factory.io,
        git: git.as_ref(),
        forge: forge.as_ref(),
        finder: &finder,
        prompter: &prompter,
        browser: &browser,
        git_protocol: factory.config.git_protocol(&factory.host()?),
        repo_override: factory.repo_override()?,
        preserve_dir: factory.paths.preserve_dir(),
        retry: RetryPolicy::default(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(create_run(&env, &opts))
}

pub fn view(factory: &Factory, args: ViewArgs) -> Result<()> {
    let opts = ViewOptions {
        selector: args.selector.unwrap_or_default(),
        web: args.web,
        comments: args.comments,
    };
    let finder = finder(factory)?;
    let browser = factory.browser();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_view(&factory.io, &finder, &browser, opts))
}

fn has_edits(args: &EditArgs) -> bool {
    args.title.is_some()
        || args.body.is_some()
        || args.body_file.is_some()
        || args.base.is_some()
        || !args.add_reviewer.is_empty()
        || !args.remove_reviewer.is_empty()
        || !args.add_assignee.is_empty()
        || !args.remove_assignee.is_empty()
        || !args.add_label.is_empty()
        || !args.remove_label.is_empty()
        || !args.add_project.is_empty()
        || !args.remove_project.is_empty()
        || args.milestone.is_some()
        || args.remove_milestone
}

/// Validate `pr edit` flags and turn them into requested edits.
///
/// With no edit flags the command turns interactive, which needs a
/// terminal.
pub fn edit_options(io: &IoStreams, args: EditArgs, stdin: &mut dyn Read) -> Result<EditOptions> {
    if args.body.is_some() && args.body_file.is_some() {
        return Err(CliError::Flag("specify only one of `--body` or `--body-file`".into()).into());
    }
    if args.milestone.is_some() && args.remove_milestone {
        return Err(CliError::Flag(
            "specify only one of `--milestone` or `--remove-milestone`".into(),
        )
        .into());
    }

    let interactive = !has_edits(&args);
    if interactive && !io.can_prompt() {
        return Err(CliError::Flag(
            "--title, --body, --reviewer, --assignee, --label, --project, or --milestone required when not running interactively"
                .into(),
        )
        .into());
    }

    let mut editable = Editable::default();
    if let Some(title) = args.title {
        editable.title.value = title;
        editable.title.edited = true;
    }

    let body = match args.body_file.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            stdin.read_to_string(&mut buf)?;
            Some(buf)
        }
        Some(path) => Some(
            std::fs::read_to_string(path)
                .map_err(|e| anyhow!("failed to read file {path}: {e}"))?,
        ),
        None => args.body,
    };
    if let Some(body) = body {
        editable.body.value = body;
        editable.body.edited = true;
    }

    if let Some(base) = args.base {
        editable.base.value = base;
        editable.base.edited = true;
    }

    if !args.add_reviewer.is_empty() || !args.remove_reviewer.is_empty() {
        editable.reviewers.add = args.add_reviewer;
        editable.reviewers.remove = args.remove_reviewer;
        editable.reviewers.edited = true;
    }
    if !args.add_assignee.is_empty() || !args.remove_assignee.is_empty() {
        editable.assignees.logins.add = args.add_assignee;
        editable.assignees.logins.remove = args.remove_assignee;
        editable.assignees.logins.edited = true;
    }
    if !args.add_label.is_empty() || !args.remove_label.is_empty() {
        editable.labels.add = args.add_label;
        editable.labels.remove = args.remove_label;
        editable.labels.edited = true;
    }
    if !args.add_project.is_empty() || !args.remove_project.is_empty() {
        editable.projects.titles.add = args.add_project;
        editable.projects.titles.remove = args.remove_project;
        editable.projects.titles.edited = true;
    }

    if let Some(milestone) = args.milestone {
        editable.milestone.value = milestone;
        editable.milestone.edited = true;
    } else if args.remove_milestone {
        editable.milestone.value = String::new();
        editable.milestone.edited = true;
    }

    Ok(EditOptions {
        selector: args.selector.unwrap_or_default(),
        interactive,
        editable,
    })
}

pub fn edit(factory: &Factory, args: EditArgs) -> Result<()> {
    let opts = edit_options(&factory.io, args, &mut std::io::stdin())?;
    let forge = factory.forge()?;
    let finder = finder(factory)?;
    let prompter = factory.prompter();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_edit(&factory.io, &finder, forge.as_ref(), &prompter, opts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit_err(args: EditArgs) -> String {
        let (io, _) = IoStreams::test();
        edit_options(&io, args, &mut std::io::empty())
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn body_flags_are_exclusive() {
        let err = edit_err(EditArgs {
            body: Some("b".into()),
            body_file: Some("f".into()),
            ..Default::default()
        });
        assert_eq!(err, "specify only one of `--body` or `--body-file`");
    }

    #[test]
    fn milestone_flags_are_exclusive() {
        let err = edit_err(EditArgs {
            milestone: Some("v1".into()),
            remove_milestone: true,
            ..Default::default()
        });
        assert_eq!(err, "specify only one of `--milestone` or `--remove-milestone`");
    }

    #[test]
    fn nothing_to_edit_without_tty() {
        let err = edit_err(EditArgs::default());
        assert!(err.ends_with("required when not running interactively"));
    }

    #[test]
    fn flags_become_edits() {
        let (io, _) = IoStreams::test();
        let args = EditArgs {
            selector: Some("23".into()),
            title: Some("New".into()),
            add_label: vec!["bug".into()],
            remove_assignee: vec!["@me".into()],
            remove_milestone: true,
            ..Default::default()
        };
        let opts = edit_options(&io, args, &mut std::io::empty()).unwrap();

        assert_eq!(opts.selector, "23");
        assert!(!opts.interactive);
        assert_eq!(opts.editable.title_value(), Some("New"));
        assert!(opts.editable.labels.edited);
        assert_eq!(opts.editable.assignees.logins.remove, vec!["@me"]);
        assert!(opts.editable.milestone.edited);
        assert_eq!(opts.editable.milestone.value, "");
        assert!(!opts.editable.body.edited);
    }

    #[test]
    fn body_from_stdin() {
        let (io, _) = IoStreams::test();
        let args = EditArgs {
            body_file: Some("-".into()),
            ..Default::default()
        };
        let opts = edit_options(&io, args, &mut "from stdin".as_bytes()).unwrap();
        assert_eq!(opts.editable.body_value(), Some("from stdin"));
    }

    #[test]
    fn empty_args_go_interactive_on_tty() {
        let (io, _) = IoStreams::test();
        let io = io.with_tty(true);
        let opts = edit_options(&io, EditArgs::default(), &mut std::io::empty()).unwrap();
        assert!(opts.interactive);
        assert!(!opts.editable.dirty());
    }

    #[test]
    fn create_flags_map_through() {
        let opts = create_options(CreateArgs {
            head: Some("monalisa:feature".into()),
            base: Some("develop".into()),
            recover: Some("state.json".into()),
            ..Default::default()
        });
        assert_eq!(opts.head_branch.as_deref(), Some("monalisa:feature"));
        assert_eq!(opts.base_branch.as_deref(), Some("develop"));
        assert_eq!(opts.recover_file, Some("state.json".into()));
    }
}
