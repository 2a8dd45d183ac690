//! pr::templates
//!
//! Pull request body templates from the working tree.
//!
//! # Lookup
//!
//! Named templates are the Markdown files in a `PULL_REQUEST_TEMPLATE`
//! directory under `.github/`, the repository root, or `docs/`. When none
//! exist, a single legacy `pull_request_template.md` in one of the same
//! three places is used as the default body. Names compare
//! case-insensitively.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::ui::prompts::{PromptError, Prompter};

const SEARCH_DIRS: &[&str] = &[".github", ".", "docs"];
const TEMPLATE_DIR: &str = "pull_request_template";
const LEGACY_FILE: &str = "pull_request_template.md";
const BLANK_OPTION: &str = "Open a blank pull request";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template named \"{0}\" found")]
    NotFound(String),

    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// A body template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// File name, e.g. `bug_fix.md`.
    pub name: String,
    pub body: String,
}

/// Finds templates below a working tree root.
#[derive(Debug, Clone)]
pub struct TemplateManager {
    root: PathBuf,
}

impl TemplateManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Named templates, sorted by name.
    pub fn templates(&self) -> Result<Vec<Template>, TemplateError> {
        let mut found = Vec::new();
        for dir in SEARCH_DIRS {
            let Some(template_dir) = find_entry(&self.root.join(dir), TEMPLATE_DIR, true) else {
                continue;
            };
            let entries = fs::read_dir(&template_dir).map_err(|source| TemplateError::Io {
                path: template_dir.clone(),
                source,
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                let is_markdown = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
                if path.is_file() && is_markdown {
                    found.push(read_template(&path)?);
                }
            }
            if !found.is_empty() {
                break;
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    /// The single default template, if the repository has one.
    pub fn legacy_template(&self) -> Result<Option<Template>, TemplateError> {
        for dir in SEARCH_DIRS {
            if let Some(path) = find_entry(&self.root.join(dir), LEGACY_FILE, false) {
                return read_template(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// The named template `name`.
    pub fn select(&self, name: &str) -> Result<Template, TemplateError> {
        if let Some(template) = self
            .templates()?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            return Ok(template);
        }
        match self.legacy_template()? {
            Some(template) if template.name.eq_ignore_ascii_case(name) => Ok(template),
            _ => Err(TemplateError::NotFound(name.to_string())),
        }
    }

    /// Let the user pick a named template, or fall back to the legacy one.
    pub fn choose(&self, prompter: &dyn Prompter) -> Result<Option<Template>, TemplateError> {
        let mut templates = self.templates()?;
        if templates.is_empty() {
            return self.legacy_template();
        }

        let mut options: Vec<String> = templates.iter().map(|t| t.name.clone()).collect();
        options.push(BLANK_OPTION.to_string());
        let picked = prompter.select("Choose a template", Some(0), &options)?;
        if picked >= templates.len() {
            return Ok(None);
        }
        Ok(Some(templates.swap_remove(picked)))
    }
}

/// Case-insensitive lookup of `name` inside `dir`.
fn find_entry(dir: &Path, name: &str, want_dir: bool) -> Option<PathBuf> {
    fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).find(|path| {
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(name));
        matches && path.is_dir() == want_dir
    })
}

fn read_template(path: &Path) -> Result<Template, TemplateError> {
    let content = fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(template = %name, "loaded template");
    Ok(Template {
        name,
        body: strip_front_matter(&content).to_string(),
    })
}

/// Drop a leading `---` YAML block.
fn strip_front_matter(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---\n") else {
        return content;
    };
    match rest.find("\n---\n") {
        Some(end) => &rest[end + "\n---\n".len()..],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::prompts::{ScriptedAnswer, ScriptedPrompter};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn named_templates_in_github_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".github/PULL_REQUEST_TEMPLATE/feature.md", "## Feature");
        write(dir.path(), ".github/PULL_REQUEST_TEMPLATE/bug.md", "## Bug");
        write(dir.path(), ".github/PULL_REQUEST_TEMPLATE/notes.txt", "ignored");

        let names: Vec<_> = TemplateManager::new(dir.path())
            .templates()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["bug.md", "feature.md"]);
    }

    #[test]
    fn legacy_template_any_case() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/PULL_REQUEST_TEMPLATE.md", "Describe it");

        let manager = TemplateManager::new(dir.path());
        let template = manager.legacy_template().unwrap().unwrap();
        assert_eq!(template.body, "Describe it");
        assert_eq!(manager.choose(&ScriptedPrompter::new(vec![])).unwrap(), Some(template));
    }

    #[test]
    fn select_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "PULL_REQUEST_TEMPLATE/bug.md",
            "---\nname: Bug\n---\n## Steps",
        );

        let manager = TemplateManager::new(dir.path());
        assert_eq!(manager.select("BUG.md").unwrap().body, "## Steps");
        let err = manager.select("nope.md").unwrap_err();
        assert_eq!(err.to_string(), "no template named \"nope.md\" found");
    }

    #[test]
    fn choose_blank() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".github/PULL_REQUEST_TEMPLATE/bug.md", "## Bug");

        let prompter = ScriptedPrompter::new(vec![ScriptedAnswer::Select(BLANK_OPTION.into())]);
        let chosen = TemplateManager::new(dir.path()).choose(&prompter).unwrap();
        assert_eq!(chosen, None);
        assert_eq!(prompter.asked(), vec!["Choose a template"]);
    }

    #[test]
    fn no_templates() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TemplateManager::new(dir.path());
        assert!(manager.templates().unwrap().is_empty());
        assert_eq!(manager.legacy_template().unwrap(), None);
    }
}
