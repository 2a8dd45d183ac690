//! pr::edit
//!
//! `ghr pr edit`: change the title, body, base, reviewers, assignees,
//! labels, projects or milestone of a pull request.
//!
//! # Design
//!
//! Edits arrive as an [`Editable`], either from flags or from prompts. The
//! changes are applied by independent API calls (label additions, label
//! removals, project items, scalar field replacement, review requests)
//! issued concurrently; the first failure is reported.

use std::io::Write;

use anyhow::Result;
use thiserror::Error;
use tracing::debug;

use super::finder::{FindOptions, PrFinder};
use crate::core::editable::Editable;
use crate::core::types::Repo;
use crate::forge::{
    Forge, ForgeError, MetadataNotFound, ProjectItemChanges, UpdatePullRequestInput,
};
use crate::ui::output::IoStreams;
use crate::ui::prompts::{PromptError, Prompter};

/// Fields fetched for the pull request being edited.
pub const EDIT_FIELDS: &[&str] = &[
    "id",
    "author",
    "url",
    "title",
    "body",
    "baseRefName",
    "reviewRequests",
    "labels",
    "projectItems",
    "milestone",
    "assignees",
];

/// Errors from applying edits.
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Metadata(#[from] MetadataNotFound),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Discarding...")]
    Discarded,
}

/// Input to [`run_edit`].
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub selector: String,
    /// Ask which fields to edit instead of taking them from flags.
    pub interactive: bool,
    pub editable: Editable,
}

/// Find the pull request, collect edits, apply them, print the URL.
pub async fn run_edit(
    io: &IoStreams,
    finder: &dyn PrFinder,
    forge: &dyn Forge,
    prompter: &dyn Prompter,
    opts: EditOptions,
) -> Result<()> {
    let find = FindOptions::new(opts.selector.clone(), EDIT_FIELDS);
    let (pr, repo) = finder.find(find).await?;

    let mut editable = opts.editable;
    editable.reviewers.allowed = true;
    editable.title.default = pr.title.clone();
    editable.body.default = pr.body.clone();
    editable.base.default = pr.base_ref_name.clone();
    editable.reviewers.default = pr.review_requests.clone();
    editable.assignees.logins.default = pr.assignees.iter().map(|a| a.login.clone()).collect();
    editable.labels.default = pr.labels.iter().map(|l| l.name.clone()).collect();
    editable.projects.titles.default = pr
        .project_items
        .iter()
        .map(|i| i.project.title.clone())
        .collect();
    editable.projects.project_items = pr
        .project_items
        .iter()
        .map(|i| (i.project.id.clone(), i.id.clone()))
        .collect();
    if let Some(milestone) = &pr.milestone {
        editable.milestone.default = milestone.title.clone();
    }

    if opts.interactive {
        fields_to_edit_survey(prompter, &mut editable)?;
    }

    let input = editable.metadata_input();
    if !input.is_empty() {
        io.progress("Fetching repository metadata...")?;
        let metadata = forge.repo_metadata(&repo, input).await?;
        editable.apply_metadata(metadata, repo.owner());
    }

    if opts.interactive {
        if editable.reviewers.edited {
            editable.reviewers.options.retain(|o| *o != pr.author);
        }
        edit_fields_survey(prompter, &mut editable)?;
    }

    let viewer_login = if editable.assignees.mentions_me() {
        Some(forge.current_login().await?)
    } else {
        None
    };

    update_pull_request(
        forge,
        &repo,
        &pr.id,
        pr.number,
        &editable,
        viewer_login.as_deref(),
    )
    .await?;

    writeln!(io.out(), "{}", pr.url)?;
    Ok(())
}

/// Apply `editable` to pull request `id`/`number`.
///
/// Label additions, label removals, project item changes, field replacement
/// and review requests are independent and run concurrently.
pub async fn update_pull_request(
    forge: &dyn Forge,
    repo: &Repo,
    id: &str,
    number: u64,
    editable: &Editable,
    viewer_login: Option<&str>,
) -> Result<(), EditError> {
    let add_labels = async {
        if !editable.labels.edited || editable.labels.add.is_empty() {
            return Ok(());
        }
        let ids = editable.metadata.labels_to_ids(&editable.labels.add)?;
        forge.add_labels(repo, id, &ids).await?;
        Ok::<(), EditError>(())
    };

    let remove_labels = async {
        if !editable.labels.edited || editable.labels.remove.is_empty() {
            return Ok(());
        }
        let ids = editable.metadata.labels_to_ids(&editable.labels.remove)?;
        forge.remove_labels(repo, id, &ids).await?;
        Ok::<(), EditError>(())
    };

    let projects = async {
        let Some((add, remove)) = editable.project_ids()? else {
            return Ok(());
        };
        if add.is_empty() && remove.is_empty() {
            return Ok(());
        }
        let changes = ProjectItemChanges {
            add: add.into_iter().map(|p| (p, id.to_string())).collect(),
            remove: remove
                .into_iter()
                .map(|p| {
                    let item = editable
                        .projects
                        .project_items
                        .get(&p)
                        .cloned()
                        .unwrap_or_default();
                    (p, item)
                })
                .collect(),
        };
        forge.update_project_items(repo, changes).await?;
        Ok::<(), EditError>(())
    };

    let fields = async {
        if !editable.fields_dirty() {
            return Ok(());
        }
        let input = UpdatePullRequestInput {
            pull_request_id: id.to_string(),
            title: editable.title_value().map(str::to_string),
            body: editable.body_value().map(str::to_string),
            base_ref_name: editable.base_value().map(str::to_string),
            assignee_ids: editable.assignee_ids(viewer_login)?,
            milestone_id: editable.milestone_id()?,
        };
        forge.update_pull_request(repo, input).await?;
        Ok::<(), EditError>(())
    };

    let reviews = async {
        if !editable.reviewers.edited {
            return Ok(());
        }
        let (add, remove) = editable.reviewer_changes();
        debug!(?add, ?remove, "updating review requests");
        futures::try_join!(
            async {
                if add.is_empty() {
                    return Ok(());
                }
                forge.request_reviews(repo, number, add).await
            },
            async {
                if remove.is_empty() {
                    return Ok(());
                }
                forge.remove_reviews(repo, number, remove).await
            },
        )?;
        Ok::<(), EditError>(())
    };

    futures::try_join!(add_labels, remove_labels, projects, fields, reviews)?;
    Ok(())
}

/// Ask which fields to edit.
pub fn fields_to_edit_survey(
    prompter: &dyn Prompter,
    editable: &mut Editable,
) -> Result<(), PromptError> {
    let mut options = vec!["Title".to_string(), "Body".to_string()];
    if editable.reviewers.allowed {
        options.push("Reviewers".into());
    }
    options.extend(["Assignees", "Labels", "Projects", "Milestone"].map(String::from));

    let picked = multi_select(prompter, "What would you like to edit?", &[], &options)?;
    for field in picked {
        match field.as_str() {
            "Title" => editable.title.edited = true,
            "Body" => editable.body.edited = true,
            "Reviewers" => editable.reviewers.edited = true,
            "Assignees" => editable.assignees.logins.edited = true,
            "Labels" => editable.labels.edited = true,
            "Projects" => editable.projects.titles.edited = true,
            "Milestone" => editable.milestone.edited = true,
            _ => {}
        }
    }
    Ok(())
}

/// Ask for the new value of every field marked as edited, then confirm.
pub fn edit_fields_survey(prompter: &dyn Prompter, editable: &mut Editable) -> Result<(), EditError> {
    if editable.title.edited {
        editable.title.value = prompter.input("Title", &editable.title.default)?;
    }
    if editable.body.edited {
        editable.body.value = prompter.markdown_editor("Body", &editable.body.default, false)?;
    }
    if editable.reviewers.edited {
        editable.reviewers.value = multi_select(
            prompter,
            "Reviewers",
            &editable.reviewers.default,
            &editable.reviewers.options,
        )?;
    }
    if editable.assignees.logins.edited {
        let logins = &mut editable.assignees.logins;
        logins.value = multi_select(prompter, "Assignees", &logins.default, &logins.options)?;
    }
    if editable.labels.edited {
        let labels = &mut editable.labels;
        labels.add = multi_select(prompter, "Labels", &labels.default, &labels.options)?;
        let removed: Vec<String> = labels
            .default
            .iter()
            .filter(|l| !labels.add.contains(l))
            .cloned()
            .collect();
        labels.remove.extend(removed);
    }
    if editable.projects.titles.edited {
        let titles = &mut editable.projects.titles;
        titles.value = multi_select(prompter, "Projects", &titles.default, &titles.options)?;
    }
    if editable.milestone.edited && !editable.milestone.options.is_empty() {
        let milestone = &mut editable.milestone;
        let default = milestone.options.iter().position(|o| *o == milestone.default);
        let index = prompter.select("Milestone", default, &milestone.options)?;
        milestone.value = milestone.options.get(index).cloned().unwrap_or_default();
    }

    if !prompter.confirm("Submit?", true)? {
        return Err(EditError::Discarded);
    }
    Ok(())
}

fn multi_select(
    prompter: &dyn Prompter,
    message: &str,
    defaults: &[String],
    options: &[String],
) -> Result<Vec<String>, PromptError> {
    if options.is_empty() {
        return Ok(Vec::new());
    }
    let picked = prompter.multi_select(message, defaults, options)?;
    Ok(picked
        .into_iter()
        .filter_map(|i| options.get(i).cloned())
        .collect())
}
