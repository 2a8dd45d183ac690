//! cli
//!
//! Command-line interface layer for ghr.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Build the [`Factory`] of collaborators a command needs
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers in [`commands`] translate flags into the
//! option structs of [`crate::pr`] and [`crate::run`] and drive their async
//! entry points on a tokio runtime. Errors that carry an exit status are
//! [`CliError`]s; `main` downcasts to pick the exit code.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::core::paths::GhrPaths;
use crate::core::remotes::Remotes;
use crate::core::types::Repo;
use crate::forge::{create_forge, Forge};
use crate::git::{Git, GitClient};
use crate::ui::browser::SystemBrowser;
use crate::ui::output::{IoStreams, Verbosity};
use crate::ui::prompts::DialoguerPrompter;

/// Errors that decide how the process exits.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad flag usage. Printed, exit status 1.
    #[error("{0}")]
    Flag(String),

    /// Already reported to the user. Exit status 1.
    #[error("")]
    Silent,

    /// The user cancelled a prompt. Exit status 2.
    #[error("")]
    Cancel,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Flag(_) | CliError::Silent => 1,
            CliError::Cancel => 2,
        }
    }
}

/// Collaborators shared by every command, built on first use.
pub struct Factory {
    pub config: Config,
    pub io: IoStreams,
    pub paths: GhrPaths,
    cwd: PathBuf,
    repo_flag: Option<String>,
    git: OnceLock<Arc<Git>>,
    forge: OnceLock<Arc<dyn Forge>>,
}

impl Factory {
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = Config::load()?;
        let io = IoStreams::system()
            .with_prompt_disabled(cli.quiet || config.prompt_disabled())
            .with_verbosity(Verbosity::from_flags(cli.quiet, cli.debug));
        let cwd = match &cli.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        Ok(Self {
            config,
            io,
            paths: GhrPaths::from_env(),
            cwd,
            repo_flag: cli.repo.clone(),
            git: OnceLock::new(),
            forge: OnceLock::new(),
        })
    }

    /// Base repository from `--repo` or `GH_REPO`, if either is set.
    pub fn repo_override(&self) -> Result<Option<Repo>> {
        let Some(value) = self
            .repo_flag
            .as_deref()
            .or(self.config.repo_override())
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };
        Ok(Some(Repo::from_full_name(value, &self.config.default_host())?))
    }

    /// Host the forge client talks to.
    pub fn host(&self) -> Result<String> {
        Ok(match self.repo_override()? {
            Some(repo) => repo.host().to_string(),
            None => self.config.default_host(),
        })
    }

    pub fn git(&self) -> Result<Arc<Git>> {
        if let Some(git) = self.git.get() {
            return Ok(Arc::clone(git));
        }
        let git = Arc::new(Git::open(&self.cwd)?);
        Ok(Arc::clone(self.git.get_or_init(|| git)))
    }

    pub fn forge(&self) -> Result<Arc<dyn Forge>> {
        if let Some(forge) = self.forge.get() {
            return Ok(Arc::clone(forge));
        }
        let host = self.host()?;
        let forge = create_forge(&host, self.config.token(&host));
        Ok(Arc::clone(self.forge.get_or_init(|| forge)))
    }

    /// The repository commands act on: the override, or the best git remote.
    pub fn base_repo(&self) -> Result<Repo> {
        if let Some(repo) = self.repo_override()? {
            return Ok(repo);
        }
        let remotes = Remotes::from_git(self.git()?.remotes()?);
        Ok(remotes.resolve_base_repo(None)?)
    }

    pub fn prompter(&self) -> DialoguerPrompter {
        DialoguerPrompter::new(self.config.editor())
    }

    pub fn browser(&self) -> SystemBrowser {
        SystemBrowser::new(self.config.browser())
    }
}

/// Install the stderr log subscriber.
///
/// `GHR_LOG` takes an `EnvFilter` directive; `--debug` forces `ghr=debug`.
pub fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("ghr=debug")
    } else {
        EnvFilter::try_from_env("GHR_LOG").unwrap_or_else(|_| EnvFilter::new("ghr=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let factory = Factory::new(&cli)?;
    commands::dispatch(cli.command, &factory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::Flag("bad".into()).exit_code(), 1);
        assert_eq!(CliError::Silent.exit_code(), 1);
        assert_eq!(CliError::Cancel.exit_code(), 2);
    }

    #[test]
    fn flag_error_displays_message() {
        let err: anyhow::Error = CliError::Flag("specify only one of --web or --log".into()).into();
        assert_eq!(err.to_string(), "specify only one of --web or --log");
        assert!(err.downcast_ref::<CliError>().is_some());
    }
}
