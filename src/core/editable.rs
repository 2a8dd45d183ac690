//! core::editable
//!
//! Requested edits to pull request metadata.
//!
//! # Design
//!
//! Each editable field records its current value on the server
//! (`default`), what the user asked for, and whether it was touched at all
//! (`edited`). List fields accept either a full replacement (`value`, from
//! interactive selection) or incremental `add`/`remove` sets (from flags).
//!
//! Every type here is a plain owned value. Concurrent updates borrow or clone
//! the whole [`Editable`]; nothing is shared mutably.
//!
//! # Example
//!
//! ```
//! use ghr::core::editable::EditableSlice;
//!
//! let labels = EditableSlice {
//!     default: vec!["bug".into(), "ui".into()],
//!     add: vec!["p1".into()],
//!     remove: vec!["ui".into()],
//!     edited: true,
//!     ..Default::default()
//! };
//! assert_eq!(labels.resolved(), vec!["bug", "p1"]);
//! ```

use std::collections::HashMap;

use crate::forge::{MetadataNotFound, RepoMetadata, RepoMetadataInput, Reviewers};

/// Milestone option meaning "no milestone".
pub const NO_MILESTONE: &str = "(none)";

/// Special assignee value for the authenticated user.
pub const ME: &str = "@me";

/// A single-valued field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableString {
    pub value: String,
    pub default: String,
    pub options: Vec<String>,
    pub edited: bool,
}

/// A multi-valued field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableSlice {
    /// Full replacement, used when neither `add` nor `remove` is set.
    pub value: Vec<String>,
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub default: Vec<String>,
    pub options: Vec<String>,
    pub edited: bool,
    /// Whether the field may be offered for editing.
    pub allowed: bool,
}

impl EditableSlice {
    /// Whether incremental changes were requested.
    pub fn has_changes(&self) -> bool {
        !self.add.is_empty() || !self.remove.is_empty()
    }

    /// The intended final list: `default + add - remove` for incremental
    /// edits, `value` otherwise. Order is preserved and duplicates dropped.
    pub fn resolved(&self) -> Vec<String> {
        if !self.has_changes() {
            return self.value.clone();
        }
        let mut result: Vec<String> = Vec::new();
        for item in self.default.iter().chain(&self.add) {
            if !result.contains(item) && !self.remove.contains(item) {
                result.push(item.clone());
            }
        }
        result
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableAssignees {
    pub logins: EditableSlice,
}

impl EditableAssignees {
    /// Whether `@me` appears in the requested changes.
    pub fn mentions_me(&self) -> bool {
        self.logins
            .add
            .iter()
            .chain(&self.logins.remove)
            .any(|l| l == ME)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableProjects {
    pub titles: EditableSlice,
    /// Project id to the id of this pull request's item in that project.
    pub project_items: HashMap<String, String>,
}

/// All requested edits plus the repository metadata needed to apply them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Editable {
    pub title: EditableString,
    pub body: EditableString,
    pub base: EditableString,
    pub reviewers: EditableSlice,
    pub assignees: EditableAssignees,
    pub labels: EditableSlice,
    pub projects: EditableProjects,
    pub milestone: EditableString,
    pub metadata: RepoMetadata,
}

fn replace_me(values: &[String], login: Option<&str>) -> Vec<String> {
    values
        .iter()
        .map(|v| match login {
            Some(login) if v == ME => login.to_string(),
            _ => v.clone(),
        })
        .collect()
}

fn without(items: &[String], excluded: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for item in items {
        if !excluded.contains(item) && !result.contains(item) {
            result.push(item.clone());
        }
    }
    result
}

impl Editable {
    /// Whether any field was touched.
    pub fn dirty(&self) -> bool {
        self.labels.edited || self.dirty_excluding_labels()
    }

    pub fn dirty_excluding_labels(&self) -> bool {
        self.title.edited
            || self.body.edited
            || self.base.edited
            || self.reviewers.edited
            || self.assignees.logins.edited
            || self.projects.titles.edited
            || self.milestone.edited
    }

    /// Whether the scalar fields replaced by a single update call changed.
    pub fn fields_dirty(&self) -> bool {
        self.title.edited
            || self.body.edited
            || self.base.edited
            || self.assignees.logins.edited
            || self.milestone.edited
    }

    pub fn title_value(&self) -> Option<&str> {
        self.title.edited.then_some(self.title.value.as_str())
    }

    pub fn body_value(&self) -> Option<&str> {
        self.body.edited.then_some(self.body.value.as_str())
    }

    pub fn base_value(&self) -> Option<&str> {
        self.base.edited.then_some(self.base.value.as_str())
    }

    /// Node ids of the complete assignee list, `None` when untouched.
    ///
    /// `@me` is replaced by `viewer_login` when given.
    pub fn assignee_ids(
        &self,
        viewer_login: Option<&str>,
    ) -> Result<Option<Vec<String>>, MetadataNotFound> {
        let assignees = &self.assignees.logins;
        if !assignees.edited {
            return Ok(None);
        }

        let logins = if assignees.has_changes() {
            let add = replace_me(&assignees.add, viewer_login);
            let remove = replace_me(&assignees.remove, viewer_login);
            let mut merged = assignees.default.clone();
            merged.extend(add);
            without(&merged, &remove)
        } else {
            assignees.value.clone()
        };

        self.metadata.members_to_ids(&logins).map(Some)
    }

    /// Project ids to add to and remove from, `None` when untouched.
    ///
    /// Incremental edits use `add`/`remove` directly; a full replacement is
    /// diffed against the current projects.
    pub fn project_ids(&self) -> Result<Option<(Vec<String>, Vec<String>)>, MetadataNotFound> {
        let projects = &self.projects.titles;
        if !projects.edited {
            return Ok(None);
        }

        let (add, remove) = if projects.has_changes() {
            (
                without(&projects.add, &[]),
                without(&projects.remove, &[]),
            )
        } else {
            (
                without(&projects.value, &projects.default),
                without(&projects.default, &projects.value),
            )
        };

        let add_ids = if add.is_empty() {
            Vec::new()
        } else {
            self.metadata.projects_to_ids(&add)?
        };
        let remove_ids = if remove.is_empty() {
            Vec::new()
        } else {
            self.metadata.projects_to_ids(&remove)?
        };
        Ok(Some((add_ids, remove_ids)))
    }

    /// `None` when untouched; `Some(None)` removes the milestone.
    pub fn milestone_id(&self) -> Result<Option<Option<String>>, MetadataNotFound> {
        if !self.milestone.edited {
            return Ok(None);
        }
        let title = self.milestone.value.as_str();
        if title.is_empty() || title == NO_MILESTONE {
            return Ok(Some(None));
        }
        self.metadata.milestone_to_id(title).map(|id| Some(Some(id)))
    }

    /// The complete requested reviewer list.
    pub fn reviewers_value(&self) -> Vec<String> {
        self.reviewers.resolved()
    }

    /// Reviewers to request and to drop, split into users and teams.
    pub fn reviewer_changes(&self) -> (Reviewers, Reviewers) {
        let wanted = self.reviewers_value();
        let dropped: Vec<String> = self
            .reviewers
            .default
            .iter()
            .filter(|r| !wanted.contains(r))
            .cloned()
            .collect();
        (
            partition_users_and_teams(&wanted),
            partition_users_and_teams(&dropped),
        )
    }

    /// Which metadata lists are needed to apply or offer these edits.
    pub fn metadata_input(&self) -> RepoMetadataInput {
        RepoMetadataInput {
            reviewers: self.reviewers.edited,
            team_reviewers: self.reviewers.edited && !self.reviewers.has_changes(),
            assignees: self.assignees.logins.edited,
            labels: self.labels.edited,
            projects: self.projects.titles.edited,
            milestones: self.milestone.edited,
        }
    }

    /// Store fetched metadata and derive the option lists offered in prompts.
    ///
    /// Teams are offered as `owner/slug`.
    pub fn apply_metadata(&mut self, metadata: RepoMetadata, owner: &str) {
        let users: Vec<String> = metadata
            .assignable_users
            .iter()
            .map(|u| u.login.clone())
            .collect();
        let teams = metadata
            .teams
            .iter()
            .map(|t| format!("{owner}/{}", t.slug));

        self.reviewers.options = users.iter().cloned().chain(teams).collect();
        self.assignees.logins.options = users;
        self.labels.options = metadata.labels.iter().map(|l| l.name.clone()).collect();
        self.projects.titles.options = metadata.projects.iter().map(|p| p.title.clone()).collect();
        self.milestone.options = std::iter::once(NO_MILESTONE.to_string())
            .chain(metadata.milestones.iter().map(|m| m.title.clone()))
            .collect();
        self.metadata = metadata;
    }
}

/// Split reviewer names into user logins and team slugs.
///
/// Names containing `/` are `org/slug` teams; only the slug is kept.
pub fn partition_users_and_teams(names: &[String]) -> Reviewers {
    let mut reviewers = Reviewers::default();
    for name in names {
        match name.split_once('/') {
            Some((_, slug)) => reviewers.teams.push(slug.to_string()),
            None => reviewers.users.push(name.clone()),
        }
    }
    reviewers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::{Actor, Milestone, Project, Team};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn metadata() -> RepoMetadata {
        RepoMetadata {
            assignable_users: ["monalisa", "hubot", "octocat"]
                .iter()
                .enumerate()
                .map(|(i, login)| Actor {
                    id: format!("U_{i}"),
                    login: login.to_string(),
                    name: None,
                })
                .collect(),
            teams: vec![Team {
                id: "T_1".into(),
                slug: "core".into(),
            }],
            projects: vec![
                Project {
                    id: "P_1".into(),
                    title: "Roadmap".into(),
                },
                Project {
                    id: "P_2".into(),
                    title: "Triage".into(),
                },
            ],
            milestones: vec![Milestone {
                id: "M_1".into(),
                number: 1,
                title: "v1".into(),
            }],
            ..Default::default()
        }
    }

    mod slices {
        use super::*;

        #[test]
        fn resolved_without_changes_is_value() {
            let slice = EditableSlice {
                value: strings(&["a"]),
                default: strings(&["b"]),
                ..Default::default()
            };
            assert_eq!(slice.resolved(), strings(&["a"]));
        }

        #[test]
        fn resolved_applies_add_and_remove() {
            let slice = EditableSlice {
                default: strings(&["a", "b"]),
                add: strings(&["c", "a"]),
                remove: strings(&["b"]),
                ..Default::default()
            };
            assert_eq!(slice.resolved(), strings(&["a", "c"]));
        }

        #[test]
        fn clones_are_independent() {
            let original = Editable {
                labels: EditableSlice {
                    add: strings(&["bug"]),
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut copy = original.clone();
            copy.labels.add.push("ui".into());
            assert_eq!(original.labels.add, strings(&["bug"]));
        }
    }

    mod dirtiness {
        use super::*;

        #[test]
        fn untouched_is_clean() {
            assert!(!Editable::default().dirty());
        }

        #[test]
        fn labels_alone() {
            let mut e = Editable::default();
            e.labels.edited = true;
            assert!(e.dirty());
            assert!(!e.dirty_excluding_labels());
        }

        #[test]
        fn values_only_when_edited() {
            let mut e = Editable::default();
            e.title.value = "new".into();
            assert_eq!(e.title_value(), None);
            e.title.edited = true;
            assert_eq!(e.title_value(), Some("new"));
        }
    }

    mod assignees {
        use super::*;

        #[test]
        fn untouched_is_none() {
            let e = Editable::default();
            assert_eq!(e.assignee_ids(None).unwrap(), None);
        }

        #[test]
        fn me_is_replaced_by_login() {
            let e = Editable {
                assignees: EditableAssignees {
                    logins: EditableSlice {
                        default: strings(&["hubot"]),
                        add: strings(&["@me"]),
                        edited: true,
                        ..Default::default()
                    },
                },
                metadata: metadata(),
                ..Default::default()
            };
            assert!(e.assignees.mentions_me());
            assert_eq!(
                e.assignee_ids(Some("monalisa")).unwrap(),
                Some(strings(&["U_1", "U_0"]))
            );
        }

        #[test]
        fn remove_beats_default() {
            let e = Editable {
                assignees: EditableAssignees {
                    logins: EditableSlice {
                        default: strings(&["hubot", "octocat"]),
                        remove: strings(&["hubot"]),
                        edited: true,
                        ..Default::default()
                    },
                },
                metadata: metadata(),
                ..Default::default()
            };
            assert_eq!(e.assignee_ids(None).unwrap(), Some(strings(&["U_2"])));
        }

        #[test]
        fn unknown_login_is_error() {
            let e = Editable {
                assignees: EditableAssignees {
                    logins: EditableSlice {
                        value: strings(&["ghost"]),
                        edited: true,
                        ..Default::default()
                    },
                },
                metadata: metadata(),
                ..Default::default()
            };
            assert_eq!(e.assignee_ids(None).unwrap_err().to_string(), "'ghost' not found");
        }
    }

    mod projects {
        use super::*;

        #[test]
        fn incremental_edits_use_add_and_remove() {
            let e = Editable {
                projects: EditableProjects {
                    titles: EditableSlice {
                        add: strings(&["Roadmap"]),
                        remove: strings(&["Triage"]),
                        edited: true,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                metadata: metadata(),
                ..Default::default()
            };
            assert_eq!(
                e.project_ids().unwrap(),
                Some((strings(&["P_1"]), strings(&["P_2"])))
            );
        }

        #[test]
        fn replacement_is_diffed_against_default() {
            let e = Editable {
                projects: EditableProjects {
                    titles: EditableSlice {
                        value: strings(&["Roadmap"]),
                        default: strings(&["Triage"]),
                        edited: true,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                metadata: metadata(),
                ..Default::default()
            };
            assert_eq!(
                e.project_ids().unwrap(),
                Some((strings(&["P_1"]), strings(&["P_2"])))
            );
        }
    }

    mod milestone {
        use super::*;

        #[test]
        fn empty_and_none_remove() {
            let mut e = Editable {
                metadata: metadata(),
                ..Default::default()
            };
            assert_eq!(e.milestone_id().unwrap(), None);

            e.milestone.edited = true;
            assert_eq!(e.milestone_id().unwrap(), Some(None));
            e.milestone.value = NO_MILESTONE.into();
            assert_eq!(e.milestone_id().unwrap(), Some(None));
            e.milestone.value = "v1".into();
            assert_eq!(e.milestone_id().unwrap(), Some(Some("M_1".into())));
        }
    }

    mod reviewers {
        use super::*;

        #[test]
        fn partition_splits_teams() {
            let r = partition_users_and_teams(&strings(&["monalisa", "octo/core"]));
            assert_eq!(r.users, strings(&["monalisa"]));
            assert_eq!(r.teams, strings(&["core"]));
        }

        #[test]
        fn changes_against_default() {
            let e = Editable {
                reviewers: EditableSlice {
                    default: strings(&["hubot", "octo/core"]),
                    add: strings(&["monalisa"]),
                    remove: strings(&["octo/core"]),
                    edited: true,
                    ..Default::default()
                },
                ..Default::default()
            };
            let (add, remove) = e.reviewer_changes();
            assert_eq!(add.users, strings(&["hubot", "monalisa"]));
            assert!(add.teams.is_empty());
            assert_eq!(remove.teams, strings(&["core"]));
            assert!(remove.users.is_empty());
        }
    }

    mod metadata_options {
        use super::*;

        #[test]
        fn options_from_metadata() {
            let mut e = Editable::default();
            e.apply_metadata(metadata(), "octo");
            assert!(e.reviewers.options.contains(&"octo/core".to_string()));
            assert_eq!(e.assignees.logins.options.len(), 3);
            assert_eq!(e.milestone.options, strings(&[NO_MILESTONE, "v1"]));
            assert_eq!(e.metadata.projects.len(), 2);
        }

        #[test]
        fn team_reviewers_only_for_full_replacement() {
            let mut e = Editable::default();
            e.reviewers.edited = true;
            assert!(e.metadata_input().team_reviewers);
            e.reviewers.add = strings(&["x"]);
            assert!(!e.metadata_input().team_reviewers);
        }
    }
}
