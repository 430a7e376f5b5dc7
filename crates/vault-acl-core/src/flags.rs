//! Permission flag value objects and the operations they gate.
//!
//! A folder entry is a `(read, write, delete)` triple and a document entry a
//! `(view, download)` pair. Both are keyed by `(resource, group name)` and
//! stored exactly as supplied; derived rules live in the evaluator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{DocumentId, FolderId};

/// Capabilities a group holds on one folder's credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderFlags {
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
}

impl FolderFlags {
    /// No access. Equivalent to having no entry at all.
    pub const NONE: Self = Self::new(false, false, false);

    /// Read, write and delete.
    pub const ALL: Self = Self::new(true, true, true);

    pub const fn new(can_read: bool, can_write: bool, can_delete: bool) -> Self {
        Self {
            can_read,
            can_write,
            can_delete,
        }
    }

    /// Read-only access.
    pub const fn read_only() -> Self {
        Self::new(true, false, false)
    }

    /// The flag that gates `op`.
    pub const fn allows(&self, op: FolderOp) -> bool {
        match op {
            FolderOp::Read => self.can_read,
            FolderOp::Write => self.can_write,
            FolderOp::Delete => self.can_delete,
        }
    }

    pub const fn is_empty(&self) -> bool {
        !self.can_read && !self.can_write && !self.can_delete
    }
}

/// Capabilities a group holds on one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentFlags {
    pub can_view: bool,
    pub can_download: bool,
}

impl DocumentFlags {
    pub const NONE: Self = Self::new(false, false);
    pub const ALL: Self = Self::new(true, true);

    pub const fn new(can_view: bool, can_download: bool) -> Self {
        Self {
            can_view,
            can_download,
        }
    }

    /// The flags as the evaluator sees them: download implies view.
    ///
    /// Stored flags are never rewritten; this is computed on read.
    pub const fn effective(&self) -> Self {
        Self {
            can_view: self.can_view || self.can_download,
            can_download: self.can_download,
        }
    }

    pub const fn is_empty(&self) -> bool {
        !self.can_view && !self.can_download
    }
}

/// Operations gated by a folder entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderOp {
    Read,
    Write,
    Delete,
}

impl FolderOp {
    pub const ALL: [FolderOp; 3] = [FolderOp::Read, FolderOp::Write, FolderOp::Delete];

    pub const fn as_str(&self) -> &'static str {
        match self {
            FolderOp::Read => "read",
            FolderOp::Write => "write",
            FolderOp::Delete => "delete",
        }
    }
}

/// Operations gated by a document entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOp {
    View,
    Download,
}

impl DocumentOp {
    pub const ALL: [DocumentOp; 2] = [DocumentOp::View, DocumentOp::Download];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentOp::View => "view",
            DocumentOp::Download => "download",
        }
    }
}

/// The kind of resource a permission matrix is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Folder,
    Document,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Folder => f.write_str("folder"),
            ResourceKind::Document => f.write_str("document"),
        }
    }
}

/// A single access request: which resource, and which operation on it.
///
/// Resource kind and operation travel together so that a folder can only be
/// asked about folder operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Folder { id: FolderId, op: FolderOp },
    Document { id: DocumentId, op: DocumentOp },
}

impl Target {
    pub const fn folder(id: FolderId, op: FolderOp) -> Self {
        Target::Folder { id, op }
    }

    pub const fn document(id: DocumentId, op: DocumentOp) -> Self {
        Target::Document { id, op }
    }

    pub const fn kind(&self) -> ResourceKind {
        match self {
            Target::Folder { .. } => ResourceKind::Folder,
            Target::Document { .. } => ResourceKind::Document,
        }
    }

    /// Raw id of the targeted resource.
    pub const fn resource_id(&self) -> i64 {
        match self {
            Target::Folder { id, .. } => id.get(),
            Target::Document { id, .. } => id.get(),
        }
    }

    pub const fn op_name(&self) -> &'static str {
        match self {
            Target::Folder { op, .. } => op.as_str(),
            Target::Document { op, .. } => op.as_str(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.op_name(), self.kind(), self.resource_id())
    }
}

/// One row of a folder permission panel: the flags for a named group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderGrant {
    pub group: String,
    #[serde(flatten)]
    pub flags: FolderFlags,
}

impl FolderGrant {
    pub fn new(group: impl Into<String>, flags: FolderFlags) -> Self {
        Self {
            group: group.into(),
            flags,
        }
    }
}

/// One row of a document permission panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentGrant {
    pub group: String,
    #[serde(flatten)]
    pub flags: DocumentFlags,
}

impl DocumentGrant {
    pub fn new(group: impl Into<String>, flags: DocumentFlags) -> Self {
        Self {
            group: group.into(),
            flags,
        }
    }
}

/// Common view over folder and document grants, used by batch validation.
pub trait Grant {
    fn group(&self) -> &str;
}

impl Grant for FolderGrant {
    fn group(&self) -> &str {
        &self.group
    }
}

impl Grant for DocumentGrant {
    fn group(&self) -> &str {
        &self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_flags_allows() {
        let flags = FolderFlags::read_only();
        assert!(flags.allows(FolderOp::Read));
        assert!(!flags.allows(FolderOp::Write));
        assert!(!flags.allows(FolderOp::Delete));
        assert!(FolderFlags::NONE.is_empty());
        assert!(FolderOp::ALL.iter().all(|op| FolderFlags::ALL.allows(*op)));
    }

    #[test]
    fn test_download_implies_view_only_in_effective() {
        let stored = DocumentFlags::new(false, true);
        assert!(!stored.can_view);

        let effective = stored.effective();
        assert!(effective.can_view);
        assert!(effective.can_download);

        // The inverse does not hold.
        let view_only = DocumentFlags::new(true, false).effective();
        assert!(!view_only.can_download);
    }

    #[test]
    fn test_target_display() {
        let t = Target::folder(FolderId::new(3), FolderOp::Write);
        assert_eq!(t.to_string(), "write folder 3");
        assert_eq!(t.kind(), ResourceKind::Folder);

        let t = Target::document(DocumentId::new(9), DocumentOp::Download);
        assert_eq!(t.to_string(), "download document 9");
    }

    #[test]
    fn test_grant_wire_shape() {
        let grant = FolderGrant::new("senior", FolderFlags::new(true, true, false));
        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "group": "senior",
                "can_read": true,
                "can_write": true,
                "can_delete": false
            })
        );
    }
}
