//! ghr - Work with GitHub pull requests and workflow runs from the command line
//!
//! ghr creates, views and edits pull requests and inspects workflow runs.
//! Its core is the logic that decides where a branch lives: which remote it
//! is pushed to, which repository and branch a pull request should target,
//! and whether a fork has to be made first.
//!
//! # Architecture
//!
//! The codebase is layered:
//!
//! - [`cli`] - Command-line interface layer (parses args, builds collaborators)
//! - [`pr`] - Pull request commands: create, view, edit, and the PR finder
//! - [`run`] - Workflow run viewing and the run log cache
//! - [`core`] - Repository identity, remotes, ref resolution, config
//! - [`git`] - Single interface for all Git operations
//! - [`forge`] - Abstraction over the GitHub API, plus a mock for tests
//! - [`ui`] - Output streams, prompts, and the browser

pub mod cli;
pub mod core;
pub mod forge;
pub mod git;
pub mod pr;
pub mod run;
pub mod ui;
