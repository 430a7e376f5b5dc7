//! Permission matrix views.
//!
//! A matrix is what an administrator's permission panel shows for one
//! resource: a row for every registered group, whether or not that group
//! has a stored entry. Missing entries appear as the all-false flag set.

use serde::Serialize;
use std::collections::BTreeMap;

use vault_acl_core::{DocumentFlags, DocumentGrant, DocumentId, FolderFlags, FolderGrant, FolderId};

/// Where a cell's flags come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A stored entry.
    Explicit,
    /// No stored entry; the flags are the default-deny set.
    Default,
}

/// One row of a matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell<F> {
    pub group: String,
    pub flags: F,
    pub source: Source,
}

impl<F> Cell<F> {
    pub fn is_explicit(&self) -> bool {
        self.source == Source::Explicit
    }
}

impl Cell<DocumentFlags> {
    /// The flags the evaluator acts on for this row.
    pub fn effective(&self) -> DocumentFlags {
        self.flags.effective()
    }
}

/// One cell per group name, in the order given; stored flags where present.
///
/// Stored rows for names outside `groups` are dropped.
fn cells<F: Copy + Default>(
    groups: impl IntoIterator<Item = String>,
    stored: BTreeMap<String, F>,
) -> Vec<Cell<F>> {
    groups
        .into_iter()
        .map(|group| match stored.get(&group) {
            Some(flags) => Cell {
                group,
                flags: *flags,
                source: Source::Explicit,
            },
            None => Cell {
                group,
                flags: F::default(),
                source: Source::Default,
            },
        })
        .collect()
}

fn sorted(groups: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut names: Vec<String> = groups.into_iter().collect();
    names.sort();
    names.dedup();
    names
}

/// The full read/write/delete matrix of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderMatrix {
    pub folder: FolderId,
    pub cells: Vec<Cell<FolderFlags>>,
}

impl FolderMatrix {
    /// Build the matrix from the registered group names and the stored rows.
    pub fn build(
        folder: FolderId,
        groups: impl IntoIterator<Item = String>,
        stored: impl IntoIterator<Item = FolderGrant>,
    ) -> Self {
        let stored = stored.into_iter().map(|g| (g.group, g.flags)).collect();
        Self {
            folder,
            cells: cells(sorted(groups), stored),
        }
    }

    pub fn get(&self, group: &str) -> Option<&Cell<FolderFlags>> {
        self.cells.iter().find(|c| c.group == group)
    }

    /// Flags for `group`, default-deny when the group has no cell.
    pub fn flags(&self, group: &str) -> FolderFlags {
        self.get(group).map(|c| c.flags).unwrap_or_default()
    }

    /// Every cell as a grant, ready to submit back as a batch.
    pub fn to_grants(&self) -> Vec<FolderGrant> {
        self.cells
            .iter()
            .map(|c| FolderGrant::new(c.group.clone(), c.flags))
            .collect()
    }

    pub fn explicit(&self) -> impl Iterator<Item = &Cell<FolderFlags>> {
        self.cells.iter().filter(|c| c.is_explicit())
    }
}

/// The full view/download matrix of a document.
///
/// Cells hold the flags exactly as stored; [`Cell::effective`] applies
/// download-implies-view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMatrix {
    pub document: DocumentId,
    pub cells: Vec<Cell<DocumentFlags>>,
}

impl DocumentMatrix {
    pub fn build(
        document: DocumentId,
        groups: impl IntoIterator<Item = String>,
        stored: impl IntoIterator<Item = DocumentGrant>,
    ) -> Self {
        let stored = stored.into_iter().map(|g| (g.group, g.flags)).collect();
        Self {
            document,
            cells: cells(sorted(groups), stored),
        }
    }

    pub fn get(&self, group: &str) -> Option<&Cell<DocumentFlags>> {
        self.cells.iter().find(|c| c.group == group)
    }

    pub fn flags(&self, group: &str) -> DocumentFlags {
        self.get(group).map(|c| c.flags).unwrap_or_default()
    }

    /// `(group, effective flags)` for every cell.
    pub fn effective(&self) -> Vec<(String, DocumentFlags)> {
        self.cells
            .iter()
            .map(|c| (c.group.clone(), c.effective()))
            .collect()
    }

    pub fn to_grants(&self) -> Vec<DocumentGrant> {
        self.cells
            .iter()
            .map(|c| DocumentGrant::new(c.group.clone(), c.flags))
            .collect()
    }

    pub fn explicit(&self) -> impl Iterator<Item = &Cell<DocumentFlags>> {
        self.cells.iter().filter(|c| c.is_explicit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<String> {
        vec!["senior".into(), "junior".into(), "qa".into()]
    }

    #[test]
    fn test_every_group_has_a_cell() {
        let m = FolderMatrix::build(
            FolderId::new(1),
            groups(),
            vec![FolderGrant::new("senior", FolderFlags::ALL)],
        );

        let names: Vec<_> = m.cells.iter().map(|c| c.group.as_str()).collect();
        assert_eq!(names, vec!["junior", "qa", "senior"]);

        let junior = m.get("junior").unwrap();
        assert_eq!(junior.flags, FolderFlags::NONE);
        assert_eq!(junior.source, Source::Default);
        assert!(m.get("senior").unwrap().is_explicit());
        assert_eq!(m.explicit().count(), 1);
    }

    #[test]
    fn test_explicit_all_false_is_not_default() {
        let m = FolderMatrix::build(
            FolderId::new(1),
            groups(),
            vec![FolderGrant::new("qa", FolderFlags::NONE)],
        );
        assert_eq!(m.get("qa").unwrap().source, Source::Explicit);
        assert_eq!(m.flags("qa"), FolderFlags::NONE);
    }

    #[test]
    fn test_unregistered_rows_dropped() {
        let m = FolderMatrix::build(
            FolderId::new(1),
            vec!["junior".to_string()],
            vec![FolderGrant::new("ghost", FolderFlags::ALL)],
        );
        assert_eq!(m.cells.len(), 1);
        assert!(m.get("ghost").is_none());
        assert_eq!(m.flags("ghost"), FolderFlags::NONE);
    }

    #[test]
    fn test_document_matrix_keeps_stored_flags() {
        let m = DocumentMatrix::build(
            DocumentId::new(4),
            groups(),
            vec![DocumentGrant::new("junior", DocumentFlags::new(false, true))],
        );

        let cell = m.get("junior").unwrap();
        assert!(!cell.flags.can_view);
        assert!(cell.effective().can_view);

        let effective = m.effective();
        assert_eq!(effective[0], ("junior".to_string(), DocumentFlags::ALL));
        assert_eq!(effective[1].1, DocumentFlags::NONE);
    }

    #[test]
    fn test_to_grants_round_trips_through_build() {
        let m = DocumentMatrix::build(
            DocumentId::new(4),
            groups(),
            vec![DocumentGrant::new("qa", DocumentFlags::new(true, false))],
        );
        let rebuilt = DocumentMatrix::build(DocumentId::new(4), groups(), m.to_grants());
        assert_eq!(rebuilt.flags("qa"), m.flags("qa"));
        assert_eq!(rebuilt.explicit().count(), 3);
    }
}
