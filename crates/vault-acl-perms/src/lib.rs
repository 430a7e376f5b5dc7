//! # Vault ACL Permissions
//!
//! Access evaluation and permission matrix views.
//!
//! ## Overview
//!
//! Access is granted per group. Each folder and document carries at most one
//! entry per group; a missing entry means no access. This crate holds the
//! pure decision logic over those entries and the panel-shaped views an
//! administrator edits. Lookups and writes live in `vault-acl-store`.
//!
//! ## Key Concepts
//!
//! - **Admin bypass**: an admin actor is allowed every operation, with no lookup
//! - **Default-deny**: no entry, no access
//! - **Download implies view**: applied when evaluating, never when storing
//! - **Verdict**: a decision with the rule that produced it
//!
//! ## Usage
//!
//! ```rust
//! use vault_acl_core::{Actor, FolderFlags, FolderId, FolderOp, UserId};
//! use vault_acl_perms::{evaluate_folder, Basis, Decision};
//!
//! let actor = Actor::user(UserId::new(2), "junior");
//! let entry = FolderFlags::read_only();
//!
//! let verdict = evaluate_folder(&actor, FolderId::new(1), FolderOp::Write, Some(&entry));
//! assert_eq!(verdict.decision, Decision::Deny);
//! assert_eq!(verdict.basis, Basis::NotGranted);
//! ```

pub mod evaluator;
pub mod matrix;

pub use evaluator::{
    effective_document_flags, effective_folder_flags, evaluate_document, evaluate_folder, Basis,
    Decision, Verdict,
};
pub use matrix::{Cell, DocumentMatrix, FolderMatrix, Source};
