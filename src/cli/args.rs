//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output; disables prompts
//! - `--repo` / `-R`: Select another repository using the `[HOST/]OWNER/REPO` format

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ghr - Work with GitHub pull requests and workflow runs from the command line
#[derive(Parser, Debug)]
#[command(name = "ghr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if ghr was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; disables prompts
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Select another repository using the [HOST/]OWNER/REPO format
    #[arg(short = 'R', long, global = true, value_name = "[HOST/]OWNER/REPO")]
    pub repo: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage pull requests
    Pr {
        #[command(subcommand)]
        action: PrCommand,
    },

    /// View details about workflow runs
    Run {
        #[command(subcommand)]
        action: RunCommand,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `ghr pr` subcommands.
#[derive(Subcommand, Debug)]
pub enum PrCommand {
    /// Create a pull request
    #[command(after_help = "\
EXAMPLES:
    ghr pr create --title \"The bug is fixed\" --body \"Everything works again\"
    ghr pr create --reviewer monalisa,hubot --reviewer myorg/team-name
    ghr pr create --project \"Roadmap\"
    ghr pr create --base develop --head monalisa:feature
    ghr pr create --template \"bug_fix.md\"")]
    Create(CreateArgs),

    /// View a pull request
    View(ViewArgs),

    /// Edit a pull request
    #[command(after_help = "\
EXAMPLES:
    ghr pr edit 23 --title \"I found a bug\" --body \"Nothing works\"
    ghr pr edit 23 --add-label \"bug,help wanted\" --remove-label \"core\"
    ghr pr edit 23 --add-reviewer monalisa,hubot --remove-reviewer myorg/team-name
    ghr pr edit 23 --add-assignee \"@me\" --remove-assignee monalisa,hubot
    ghr pr edit 23 --milestone \"Version 1\"
    ghr pr edit 23 --remove-milestone")]
    Edit(EditArgs),
}

/// Flags of `ghr pr create`.
#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Title for the pull request
    #[arg(short, long)]
    pub title: Option<String>,

    /// Body for the pull request
    #[arg(short, long)]
    pub body: Option<String>,

    /// Read body text from file (use "-" to read from standard input)
    #[arg(short = 'F', long, value_name = "FILE")]
    pub body_file: Option<String>,

    /// The branch into which you want your code merged
    #[arg(short = 'B', long)]
    pub base: Option<String>,

    /// The branch that contains commits for your pull request (default [current branch])
    #[arg(short = 'H', long)]
    pub head: Option<String>,

    /// Mark pull request as a draft
    #[arg(short, long)]
    pub draft: bool,

    /// Open the web browser to create a pull request
    #[arg(short, long)]
    pub web: bool,

    /// Skip prompts and open the text editor to write the title and body in
    #[arg(short, long)]
    pub editor: bool,

    /// Use commit info for title and body
    #[arg(short, long)]
    pub fill: bool,

    /// Use first commit info for title and body
    #[arg(long)]
    pub fill_first: bool,

    /// Use commits msg+body for description
    #[arg(long)]
    pub fill_verbose: bool,

    /// Request reviews from people or teams by their handle
    #[arg(short, long = "reviewer", value_name = "HANDLE", value_delimiter = ',')]
    pub reviewers: Vec<String>,

    /// Assign people by their login. Use "@me" to self-assign.
    #[arg(short, long = "assignee", value_name = "LOGIN", value_delimiter = ',')]
    pub assignees: Vec<String>,

    /// Add labels by name
    #[arg(short, long = "label", value_name = "NAME", value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Add the pull request to projects by title
    #[arg(short, long = "project", value_name = "TITLE", value_delimiter = ',')]
    pub projects: Vec<String>,

    /// Add the pull request to a milestone by name
    #[arg(short, long, value_name = "NAME")]
    pub milestone: Option<String>,

    /// Disable maintainer's ability to modify pull request
    #[arg(long)]
    pub no_maintainer_edit: bool,

    /// Recover input from a failed run of create
    #[arg(long, value_name = "FILE")]
    pub recover: Option<PathBuf>,

    /// Template file to use as starting body text
    #[arg(short = 'T', long, value_name = "FILE")]
    pub template: Option<String>,

    /// Print details instead of creating the PR
    #[arg(long)]
    pub dry_run: bool,
}

/// Flags of `ghr pr view`.
#[derive(Args, Debug, Default)]
pub struct ViewArgs {
    /// Number, URL or branch of the pull request (default [current branch])
    pub selector: Option<String>,

    /// Open a pull request in the browser
    #[arg(short, long)]
    pub web: bool,

    /// View pull request comments
    #[arg(short, long)]
    pub comments: bool,
}

/// Flags of `ghr pr edit`.
#[derive(Args, Debug, Default)]
pub struct EditArgs {
    /// Number, URL or branch of the pull request (default [current branch])
    pub selector: Option<String>,

    /// Set the new title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Set the new body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Read body text from file (use "-" to read from standard input)
    #[arg(short = 'F', long, value_name = "FILE")]
    pub body_file: Option<String>,

    /// Change the base branch for this pull request
    #[arg(short = 'B', long)]
    pub base: Option<String>,

    /// Add reviewers by their login
    #[arg(long, value_name = "LOGIN", value_delimiter = ',')]
    pub add_reviewer: Vec<String>,

    /// Remove reviewers by their login
    #[arg(long, value_name = "LOGIN", value_delimiter = ',')]
    pub remove_reviewer: Vec<String>,

    /// Add assigned users by their login. Use "@me" to assign yourself.
    #[arg(long, value_name = "LOGIN", value_delimiter = ',')]
    pub add_assignee: Vec<String>,

    /// Remove assigned users by their login. Use "@me" to unassign yourself.
    #[arg(long, value_name = "LOGIN", value_delimiter = ',')]
    pub remove_assignee: Vec<String>,

    /// Add labels by name
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub add_label: Vec<String>,

    /// Remove labels by name
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub remove_label: Vec<String>,

    /// Add the pull request to projects by title
    #[arg(long, value_name = "TITLE", value_delimiter = ',')]
    pub add_project: Vec<String>,

    /// Remove the pull request from projects by title
    #[arg(long, value_name = "TITLE", value_delimiter = ',')]
    pub remove_project: Vec<String>,

    /// Edit the milestone the pull request belongs to by name
    #[arg(short, long, value_name = "NAME")]
    pub milestone: Option<String>,

    /// Remove the milestone association from the pull request
    #[arg(long)]
    pub remove_milestone: bool,
}

/// `ghr run` subcommands.
#[derive(Subcommand, Debug)]
pub enum RunCommand {
    /// View a summary of a workflow run
    #[command(after_help = "\
EXAMPLES:
    # View a specific run
    ghr run view 12345

    # View a specific run with specific attempt number
    ghr run view 12345 --attempt 3

    # View a specific job within a run
    ghr run view --job 456789

    # View the full log for a specific job
    ghr run view --log --job 456789

    # Exit non-zero if a run failed
    ghr run view 0451 --exit-status && echo \"run pending or passed\"")]
    View(RunViewArgs),
}

/// Flags of `ghr run view`.
#[derive(Args, Debug, Default)]
pub struct RunViewArgs {
    /// ID of the workflow run
    pub run_id: Option<u64>,

    /// View a specific job ID from a run
    #[arg(short, long = "job", value_name = "JOB_ID")]
    pub job_id: Option<u64>,

    /// The attempt number of the workflow run
    #[arg(short, long)]
    pub attempt: Option<u64>,

    /// View full log for either a run or specific job
    #[arg(long)]
    pub log: bool,

    /// View the log for any failed steps in a run or specific job
    #[arg(long)]
    pub log_failed: bool,

    /// Open run in the browser
    #[arg(short, long)]
    pub web: bool,

    /// Exit with non-zero status if run failed
    #[arg(long)]
    pub exit_status: bool,

    /// Show job steps
    #[arg(short, long)]
    pub verbose: bool,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
