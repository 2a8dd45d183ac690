//! ui::prompts
//!
//! Interactive prompts and confirmations.
//!
//! # Design
//!
//! Prompts are only shown in interactive mode (see
//! [`IoStreams::can_prompt`](super::output::IoStreams::can_prompt)). In
//! non-interactive mode, operations requiring user input must either have
//! defaults or fail with a clear error message.
//!
//! Commands receive a `&dyn Prompter`. The terminal implementation is
//! [`DialoguerPrompter`]; tests script answers with [`ScriptedPrompter`].
//!
//! # Example
//!
//! ```
//! use ghr::ui::prompts::{Prompter, ScriptedAnswer, ScriptedPrompter};
//!
//! let prompter = ScriptedPrompter::new(vec![ScriptedAnswer::Select("Submit".into())]);
//! let options = vec!["Submit".to_string(), "Cancel".to_string()];
//! assert_eq!(prompter.select("What's next?", None, &options).unwrap(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dialoguer::{Confirm, Editor, Input, MultiSelect, Select};
use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled by user")]
    Cancelled,

    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<dialoguer::Error> for PromptError {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                PromptError::Cancelled
            }
            dialoguer::Error::IO(e) => PromptError::IoError(e.to_string()),
        }
    }
}

/// Interactive questions asked of the user.
pub trait Prompter: Send + Sync {
    /// Pick one option; returns its index.
    fn select(
        &self,
        message: &str,
        default: Option<usize>,
        options: &[String],
    ) -> Result<usize, PromptError>;

    /// Pick any number of options; returns their indices in option order.
    fn multi_select(
        &self,
        message: &str,
        defaults: &[String],
        options: &[String],
    ) -> Result<Vec<usize>, PromptError>;

    /// Single line of text.
    fn input(&self, message: &str, default: &str) -> Result<String, PromptError>;

    /// Yes or no.
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError>;

    /// Multi-line text composed in an editor.
    fn markdown_editor(
        &self,
        message: &str,
        initial: &str,
        blank_allowed: bool,
    ) -> Result<String, PromptError>;
}

/// Terminal prompts backed by `dialoguer`.
#[derive(Debug, Clone, Default)]
pub struct DialoguerPrompter {
    editor: Option<String>,
}

impl DialoguerPrompter {
    /// `editor` overrides the editor command `dialoguer` would pick.
    pub fn new(editor: Option<String>) -> Self {
        Self { editor }
    }
}

impl Prompter for DialoguerPrompter {
    fn select(
        &self,
        message: &str,
        default: Option<usize>,
        options: &[String],
    ) -> Result<usize, PromptError> {
        Select::new()
            .with_prompt(message)
            .items(options)
            .default(default.unwrap_or(0))
            .interact_opt()?
            .ok_or(PromptError::Cancelled)
    }

    fn multi_select(
        &self,
        message: &str,
        defaults: &[String],
        options: &[String],
    ) -> Result<Vec<usize>, PromptError> {
        let checked: Vec<bool> = options.iter().map(|o| defaults.contains(o)).collect();
        MultiSelect::new()
            .with_prompt(message)
            .items(options)
            .defaults(&checked)
            .interact_opt()?
            .ok_or(PromptError::Cancelled)
    }

    fn input(&self, message: &str, default: &str) -> Result<String, PromptError> {
        let value: String = Input::new()
            .with_prompt(message)
            .with_initial_text(default)
            .allow_empty(true)
            .interact_text()?;
        Ok(value)
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact_opt()?
            .ok_or(PromptError::Cancelled)
    }

    fn markdown_editor(
        &self,
        message: &str,
        initial: &str,
        blank_allowed: bool,
    ) -> Result<String, PromptError> {
        let proceed = Confirm::new()
            .with_prompt(format!("{message}: open an editor?"))
            .default(true)
            .interact_opt()?
            .ok_or(PromptError::Cancelled)?;
        if !proceed {
            return if blank_allowed {
                Ok(initial.to_string())
            } else {
                Err(PromptError::Cancelled)
            };
        }

        let mut editor = Editor::new();
        editor.extension(".md");
        if let Some(command) = &self.editor {
            editor.executable(command);
        }

        let text = editor
            .edit(initial)
            .map_err(|e| PromptError::IoError(e.to_string()))?
            .unwrap_or_else(|| initial.to_string());

        if text.trim().is_empty() && !blank_allowed {
            return Err(PromptError::Cancelled);
        }
        Ok(text)
    }
}

/// A scripted response for [`ScriptedPrompter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    /// Choose the option with this label.
    Select(String),
    /// Choose the options with these labels.
    MultiSelect(Vec<String>),
    Input(String),
    Confirm(bool),
    Editor(String),
    /// Abort the prompt as if the user pressed Ctrl-C.
    Cancel,
}

/// Prompter that replays scripted answers in order.
///
/// Each prompt consumes the next answer. A prompt whose answer has the
/// wrong kind, or names an option that was not offered, is an error.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<ScriptedAnswer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<ScriptedAnswer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Messages of every prompt shown so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether every scripted answer was consumed.
    pub fn is_exhausted(&self) -> bool {
        self.answers_lock().is_empty()
    }

    fn answers_lock(&self) -> MutexGuard<'_, VecDeque<ScriptedAnswer>> {
        self.answers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self, message: &str) -> Result<ScriptedAnswer, PromptError> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        match self.answers_lock().pop_front() {
            Some(ScriptedAnswer::Cancel) => Err(PromptError::Cancelled),
            Some(answer) => Ok(answer),
            None => Err(PromptError::IoError(format!(
                "no scripted answer for prompt \"{message}\""
            ))),
        }
    }
}

fn unexpected(message: &str, answer: &ScriptedAnswer) -> PromptError {
    PromptError::IoError(format!(
        "scripted answer {answer:?} does not fit prompt \"{message}\""
    ))
}

fn index_of(options: &[String], label: &str) -> Result<usize, PromptError> {
    options.iter().position(|o| o == label).ok_or_else(|| {
        PromptError::IoError(format!("option \"{label}\" not offered in {options:?}"))
    })
}

impl Prompter for ScriptedPrompter {
    fn select(
        &self,
        message: &str,
        _default: Option<usize>,
        options: &[String],
    ) -> Result<usize, PromptError> {
        match self.next(message)? {
            ScriptedAnswer::Select(label) => index_of(options, &label),
            other => Err(unexpected(message, &other)),
        }
    }

    fn multi_select(
        &self,
        message: &str,
        _defaults: &[String],
        options: &[String],
    ) -> Result<Vec<usize>, PromptError> {
        match self.next(message)? {
            ScriptedAnswer::MultiSelect(labels) => {
                let mut indices = labels
                    .iter()
                    .map(|label| index_of(options, label))
                    .collect::<Result<Vec<_>, _>>()?;
                indices.sort_unstable();
                Ok(indices)
            }
            other => Err(unexpected(message, &other)),
        }
    }

    fn input(&self, message: &str, _default: &str) -> Result<String, PromptError> {
        match self.next(message)? {
            ScriptedAnswer::Input(value) => Ok(value),
            other => Err(unexpected(message, &other)),
        }
    }

    fn confirm(&self, message: &str, _default: bool) -> Result<bool, PromptError> {
        match self.next(message)? {
            ScriptedAnswer::Confirm(value) => Ok(value),
            other => Err(unexpected(message, &other)),
        }
    }

    fn markdown_editor(
        &self,
        message: &str,
        _initial: &str,
        _blank_allowed: bool,
    ) -> Result<String, PromptError> {
        match self.next(message)? {
            ScriptedAnswer::Editor(text) => Ok(text),
            other => Err(unexpected(message, &other)),
        }
    }
}
