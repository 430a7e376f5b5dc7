//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vault_acl_core::{
    Actor, DocumentFlags, DocumentGrant, DocumentOp, FolderFlags, FolderGrant, FolderOp, Role,
    UserId,
};

use crate::fixtures::FIXTURE_GROUPS;

/// Generate a well-formed group name.
pub fn group_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}".prop_map(String::from)
}

/// Generate one of the fixture group names.
pub fn fixture_group() -> impl Strategy<Value = String> {
    prop::sample::select(FIXTURE_GROUPS.to_vec()).prop_map(String::from)
}

/// Generate any folder flag combination.
pub fn folder_flags() -> impl Strategy<Value = FolderFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(r, w, d)| FolderFlags::new(r, w, d))
}

/// Generate any document flag combination, including download without view.
pub fn document_flags() -> impl Strategy<Value = DocumentFlags> {
    (any::<bool>(), any::<bool>()).prop_map(|(v, d)| DocumentFlags::new(v, d))
}

pub fn folder_op() -> impl Strategy<Value = FolderOp> {
    prop::sample::select(FolderOp::ALL.to_vec())
}

pub fn document_op() -> impl Strategy<Value = DocumentOp> {
    prop::sample::select(DocumentOp::ALL.to_vec())
}

pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::User)]
}

/// Generate an actor in one of the fixture groups.
pub fn actor() -> impl Strategy<Value = Actor> {
    (1i64..1000, role(), fixture_group())
        .prop_map(|(id, role, group)| Actor::new(UserId::new(id), role, group))
}

/// Generate a folder batch over a subset of the fixture groups, each listed
/// at most once.
pub fn folder_batch() -> impl Strategy<Value = Vec<FolderGrant>> {
    prop::sample::subsequence(FIXTURE_GROUPS.to_vec(), 0..=FIXTURE_GROUPS.len())
        .prop_flat_map(|groups| {
            let n = groups.len();
            (Just(groups), prop::collection::vec(folder_flags(), n))
        })
        .prop_map(|(groups, flags)| {
            groups
                .into_iter()
                .zip(flags)
                .map(|(group, flags)| FolderGrant::new(group, flags))
                .collect()
        })
}

/// Generate a document batch over a subset of the fixture groups.
pub fn document_batch() -> impl Strategy<Value = Vec<DocumentGrant>> {
    prop::sample::subsequence(FIXTURE_GROUPS.to_vec(), 0..=FIXTURE_GROUPS.len())
        .prop_flat_map(|groups| {
            let n = groups.len();
            (Just(groups), prop::collection::vec(document_flags(), n))
        })
        .prop_map(|(groups, flags)| {
            groups
                .into_iter()
                .zip(flags)
                .map(|(group, flags)| DocumentGrant::new(group, flags))
                .collect()
        })
}

/// A batch that is valid except for one entry naming an unregistered group,
/// inserted at a random position.
#[derive(Debug, Clone)]
pub struct PoisonedBatch {
    pub grants: Vec<FolderGrant>,
    pub unknown_group: String,
}

impl Arbitrary for PoisonedBatch {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (folder_batch(), folder_flags(), any::<prop::sample::Index>())
            .prop_map(|(mut grants, flags, position)| {
                let unknown_group = "unregistered".to_string();
                let at = position.index(grants.len() + 1);
                grants.insert(at, FolderGrant::new(unknown_group.clone(), flags));
                PoisonedBatch {
                    grants,
                    unknown_group,
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn folder_batch_lists_each_group_once(batch in folder_batch()) {
            let names: HashSet<_> = batch.iter().map(|g| g.group.as_str()).collect();
            prop_assert_eq!(names.len(), batch.len());
        }

        #[test]
        fn poisoned_batch_contains_unknown_group(batch: PoisonedBatch) {
            prop_assert!(batch.grants.iter().any(|g| g.group == batch.unknown_group));
            prop_assert!(!FIXTURE_GROUPS.contains(&batch.unknown_group.as_str()));
        }

        #[test]
        fn generated_group_names_validate(name in group_name()) {
            prop_assert!(vault_acl_core::normalize_name("group", &name).is_ok());
        }
    }
}
