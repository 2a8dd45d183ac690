//! pr::state
//!
//! Title, body and metadata gathered while creating a pull request.
//!
//! # Recovery
//!
//! Interactive input is expensive to retype. When creation fails after the
//! user has typed something, the state is written to a JSON file in the
//! temp directory and its path printed; `ghr pr create --recover <file>`
//! loads it back.
//!
//! # Example
//!
//! ```
//! use ghr::pr::state::IssueMetadataState;
//!
//! let state = IssueMetadataState {
//!     title: "Fix the frobnicator".into(),
//!     labels: vec!["bug".into()],
//!     ..Default::default()
//! };
//! assert!(state.has_metadata());
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::forge::RepoMetadataInput;
use crate::ui::output::IoStreams;

/// Errors reading or writing preserved input.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize input: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything the user decided about the pull request so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueMetadataState {
    pub title: String,
    pub body: String,
    pub draft: bool,
    pub reviewers: Vec<String>,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub project_titles: Vec<String>,
    pub milestones: Vec<String>,
    /// Template name passed to the web form when the body is empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub template: String,
    /// Whether the user typed anything worth preserving.
    #[serde(skip)]
    pub dirty: bool,
}

impl IssueMetadataState {
    pub fn has_metadata(&self) -> bool {
        !self.reviewers.is_empty()
            || !self.assignees.is_empty()
            || !self.labels.is_empty()
            || !self.project_titles.is_empty()
            || !self.milestones.is_empty()
    }

    /// Metadata lists needed to translate this state into node IDs.
    pub fn metadata_input(&self) -> RepoMetadataInput {
        RepoMetadataInput {
            assignees: !self.assignees.is_empty(),
            reviewers: !self.reviewers.is_empty(),
            team_reviewers: self.reviewers.iter().any(|r| r.contains('/')),
            labels: !self.labels.is_empty(),
            projects: !self.project_titles.is_empty(),
            milestones: !self.milestones.is_empty(),
        }
    }

    /// Replace this state with the one stored in `path`.
    pub fn fill_from_json(&mut self, path: &Path) -> Result<(), StateError> {
        let data = fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let recovered: IssueMetadataState =
            serde_json::from_str(&data).map_err(|source| StateError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "recovered pull request input");

        let template = std::mem::take(&mut self.template);
        *self = recovered;
        if self.template.is_empty() {
            self.template = template;
        }
        Ok(())
    }

    /// Write the state to a fresh file under `dir` and return its path.
    pub fn preserve(&self, dir: &Path) -> Result<PathBuf, StateError> {
        let path = dir.join(format!("ghr-pr-{}.json", uuid::Uuid::new_v4()));
        let data = serde_json::to_string(self)?;
        fs::create_dir_all(dir)
            .and_then(|()| fs::write(&path, data))
            .map_err(|source| StateError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Preserve `state` after a failure, telling the user how to restore it.
///
/// Does nothing when the user has not typed anything.
pub fn preserve_input(io: &IoStreams, state: &IssueMetadataState, dir: &Path) {
    if !state.dirty {
        return;
    }

    let mut err = io.err();
    match state.preserve(dir) {
        Ok(path) => {
            let _ = writeln!(
                err,
                "{} operation failed. To restore: ghr pr create --recover {}",
                io.failure_style("X"),
                path.display()
            );
        }
        Err(e) => {
            let _ = writeln!(err, "{} failed to save input: {}", io.failure_style("X"), e);
        }
    }
}
