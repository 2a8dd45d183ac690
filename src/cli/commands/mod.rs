//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Builds its collaborators from the [`Factory`]
//! 3. Runs the async command on a tokio runtime
//!
//! Handlers hold no decision logic of their own; that lives in
//! [`crate::pr`] and [`crate::run`].

mod completion;
mod pr;
mod run;

pub use completion::completion;
pub use pr::{create_options, edit_options};
pub use run::run_view_options;

use crate::cli::args::{Command, PrCommand, RunCommand};
use crate::cli::Factory;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, factory: &Factory) -> Result<()> {
    match command {
        Command::Pr { action } => match action {
            PrCommand::Create(args) => pr::create(factory, args),
            PrCommand::View(args) => pr::view(factory, args),
            PrCommand::Edit(args) => pr::edit(factory, args),
        },
        Command::Run { action } => match action {
            RunCommand::View(args) => run::view(factory, args),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
