//! Access evaluation.
//!
//! Pure functions over an actor and the single matrix entry for its group.
//! Fetching that entry is the caller's job; nothing here performs I/O.
//!
//! Order of rules:
//!
//! 1. An admin is allowed everything, before any entry is consulted.
//! 2. No entry for the actor's group means deny.
//! 3. Otherwise the flag gating the operation decides. For documents,
//!    `can_download` also satisfies a view request.

use serde::Serialize;
use std::fmt;

use vault_acl_core::{
    Actor, DocumentFlags, DocumentId, DocumentOp, FolderFlags, FolderId, FolderOp, Target,
};

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    const fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Deny => f.write_str("deny"),
        }
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// The actor is an admin; no entry was consulted.
    AdminBypass,
    /// The entry sets the flag gating the operation.
    Granted,
    /// The entry exists but leaves the flag unset.
    NotGranted,
    /// The actor's group has no entry on the resource.
    NoEntry,
    /// A view request satisfied by `can_download` alone.
    ImpliedByDownload,
}

/// A decision together with the request it answers and the rule behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub target: Target,
    pub group: String,
    pub decision: Decision,
    pub basis: Basis,
}

impl Verdict {
    fn new(actor: &Actor, target: Target, basis: Basis) -> Self {
        let decision = Decision::from_bool(matches!(
            basis,
            Basis::AdminBypass | Basis::Granted | Basis::ImpliedByDownload
        ));
        Self {
            target,
            group: actor.group.clone(),
            decision,
            basis,
        }
    }

    pub const fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }

    /// Human-readable account of the decision.
    pub fn reason(&self) -> String {
        match self.basis {
            Basis::AdminBypass => format!("admin may {}", self.target),
            Basis::Granted => format!("group '{}' may {}", self.group, self.target),
            Basis::NotGranted => format!(
                "group '{}' has an entry but may not {}",
                self.group, self.target
            ),
            Basis::NoEntry => format!(
                "group '{}' has no entry for {} {}",
                self.group,
                self.target.kind(),
                self.target.resource_id()
            ),
            Basis::ImpliedByDownload => format!(
                "group '{}' may {} because it may download",
                self.group, self.target
            ),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.decision, self.reason())
    }
}

/// Evaluate a folder operation against the actor group's entry.
pub fn evaluate_folder(
    actor: &Actor,
    folder: FolderId,
    op: FolderOp,
    entry: Option<&FolderFlags>,
) -> Verdict {
    let target = Target::folder(folder, op);
    if actor.is_admin() {
        return Verdict::new(actor, target, Basis::AdminBypass);
    }

    let basis = match entry {
        None => Basis::NoEntry,
        Some(flags) if flags.allows(op) => Basis::Granted,
        Some(_) => Basis::NotGranted,
    };
    Verdict::new(actor, target, basis)
}

/// Evaluate a document operation against the actor group's entry.
pub fn evaluate_document(
    actor: &Actor,
    doc: DocumentId,
    op: DocumentOp,
    entry: Option<&DocumentFlags>,
) -> Verdict {
    let target = Target::document(doc, op);
    if actor.is_admin() {
        return Verdict::new(actor, target, Basis::AdminBypass);
    }

    let basis = match (entry, op) {
        (None, _) => Basis::NoEntry,
        (Some(flags), DocumentOp::View) if flags.can_view => Basis::Granted,
        (Some(flags), DocumentOp::View) if flags.can_download => Basis::ImpliedByDownload,
        (Some(flags), DocumentOp::Download) if flags.can_download => Basis::Granted,
        (Some(_), _) => Basis::NotGranted,
    };
    Verdict::new(actor, target, basis)
}

/// The folder flags an actor effectively holds: everything for an admin,
/// the stored entry otherwise, nothing without one.
pub fn effective_folder_flags(actor: &Actor, entry: Option<&FolderFlags>) -> FolderFlags {
    if actor.is_admin() {
        FolderFlags::ALL
    } else {
        entry.copied().unwrap_or_default()
    }
}

/// The document flags an actor effectively holds, with download implying view.
pub fn effective_document_flags(actor: &Actor, entry: Option<&DocumentFlags>) -> DocumentFlags {
    if actor.is_admin() {
        DocumentFlags::ALL
    } else {
        entry.map(DocumentFlags::effective).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vault_acl_core::UserId;

    fn junior() -> Actor {
        Actor::user(UserId::new(2), "junior")
    }

    fn admin() -> Actor {
        Actor::admin(UserId::new(1), "ops")
    }

    #[test]
    fn test_read_only_folder() {
        let entry = FolderFlags::read_only();
        let read = evaluate_folder(&junior(), FolderId::new(1), FolderOp::Read, Some(&entry));
        let write = evaluate_folder(&junior(), FolderId::new(1), FolderOp::Write, Some(&entry));

        assert_eq!(read.decision, Decision::Allow);
        assert_eq!(read.basis, Basis::Granted);
        assert_eq!(write.decision, Decision::Deny);
        assert_eq!(write.basis, Basis::NotGranted);
    }

    #[test]
    fn test_no_entry_denies() {
        let v = evaluate_folder(&junior(), FolderId::new(7), FolderOp::Read, None);
        assert_eq!(v.basis, Basis::NoEntry);
        assert!(!v.is_allowed());
        assert_eq!(v.reason(), "group 'junior' has no entry for folder 7");
    }

    #[test]
    fn test_admin_bypass_ignores_entry() {
        let v = evaluate_folder(
            &admin(),
            FolderId::new(1),
            FolderOp::Delete,
            Some(&FolderFlags::NONE),
        );
        assert_eq!(v.basis, Basis::AdminBypass);
        assert!(v.is_allowed());
    }

    #[test]
    fn test_download_implies_view() {
        let entry = DocumentFlags::new(false, true);
        let view = evaluate_document(&junior(), DocumentId::new(3), DocumentOp::View, Some(&entry));
        assert_eq!(view.basis, Basis::ImpliedByDownload);
        assert!(view.is_allowed());

        let entry = DocumentFlags::new(true, false);
        let download =
            evaluate_document(&junior(), DocumentId::new(3), DocumentOp::Download, Some(&entry));
        assert_eq!(download.basis, Basis::NotGranted);
    }

    #[test]
    fn test_effective_flags() {
        assert_eq!(effective_folder_flags(&admin(), None), FolderFlags::ALL);
        assert_eq!(effective_folder_flags(&junior(), None), FolderFlags::NONE);
        assert_eq!(
            effective_document_flags(&junior(), Some(&DocumentFlags::new(false, true))),
            DocumentFlags::ALL
        );
    }

    #[test]
    fn test_verdict_serializes_snake_case() {
        let v = evaluate_folder(&junior(), FolderId::new(1), FolderOp::Read, None);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["basis"], "no_entry");
        assert_eq!(json["target"]["kind"], "folder");
    }

    fn any_folder_flags() -> impl Strategy<Value = Option<FolderFlags>> {
        proptest::option::of(
            (any::<bool>(), any::<bool>(), any::<bool>())
                .prop_map(|(r, w, d)| FolderFlags::new(r, w, d)),
        )
    }

    fn any_folder_op() -> impl Strategy<Value = FolderOp> {
        prop_oneof![
            Just(FolderOp::Read),
            Just(FolderOp::Write),
            Just(FolderOp::Delete)
        ]
    }

    proptest! {
        #[test]
        fn prop_admin_always_allowed(entry in any_folder_flags(), op in any_folder_op()) {
            let v = evaluate_folder(&admin(), FolderId::new(1), op, entry.as_ref());
            prop_assert!(v.is_allowed());
        }

        #[test]
        fn prop_user_allowed_iff_flag_set(entry in any_folder_flags(), op in any_folder_op()) {
            let v = evaluate_folder(&junior(), FolderId::new(1), op, entry.as_ref());
            let expected = entry.map(|f| f.allows(op)).unwrap_or(false);
            prop_assert_eq!(v.is_allowed(), expected);
        }

        #[test]
        fn prop_view_follows_effective_flags(view in any::<bool>(), download in any::<bool>()) {
            let entry = DocumentFlags::new(view, download);
            let v = evaluate_document(&junior(), DocumentId::new(1), DocumentOp::View, Some(&entry));
            prop_assert_eq!(v.is_allowed(), view || download);
        }
    }
}
