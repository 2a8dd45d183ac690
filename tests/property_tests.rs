//! Property-based tests for core domain types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use ghr::core::refs::QualifiedHeadRef;
use ghr::core::types::Repo;
use ghr::run::logs::{sanitize_job_name, JOB_NAME_MAX_LENGTH};

/// Strategy for generating branch name characters (no `:`).
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
        Just('/'),
    ]
}

fn branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..40).prop_map(|chars| chars.into_iter().collect())
}

fn owner() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9-]{0,20}"
}

proptest! {
    #[test]
    fn qualified_head_ref_round_trips(owner in owner(), branch in branch_name()) {
        let head = QualifiedHeadRef::new(owner.clone(), branch.clone());
        let text = head.to_string();
        prop_assert_eq!(&text, &format!("{owner}:{branch}"));

        let parsed = QualifiedHeadRef::parse(&text).unwrap();
        prop_assert_eq!(parsed.owner(), Some(owner.as_str()));
        prop_assert_eq!(parsed.branch(), branch.as_str());
    }

    #[test]
    fn unqualified_head_ref_round_trips(branch in branch_name()) {
        let parsed = QualifiedHeadRef::parse(&branch).unwrap();
        prop_assert_eq!(parsed.owner(), None);
        prop_assert_eq!(parsed.to_string(), branch);
    }

    #[test]
    fn extra_colons_are_rejected(a in owner(), b in branch_name(), c in branch_name()) {
        let input = format!("{a}:{b}:{c}");
        prop_assert!(QualifiedHeadRef::parse(&input).is_err());
    }

    #[test]
    fn repo_full_name_round_trips(owner in owner(), name in "[a-zA-Z0-9._-]{1,30}") {
        prop_assume!(name != "." && name != "..");
        let repo = Repo::new(owner, name);
        let parsed = Repo::from_full_name(&repo.full_name(), "github.com").unwrap();
        prop_assert!(parsed.is_same(&repo));
    }

    #[test]
    fn sanitized_job_names_fit(name in "\\PC{0,200}") {
        let sanitized = sanitize_job_name(&name);
        prop_assert!(sanitized.encode_utf16().count() <= JOB_NAME_MAX_LENGTH);
        prop_assert!(!sanitized.contains('/'));
        prop_assert!(!sanitized.contains(':'));
        prop_assert_eq!(sanitized.trim(), sanitized.as_str());
    }
}
