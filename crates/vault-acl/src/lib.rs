//! # Vault ACL
//!
//! Group-based access control for a credential and document vault.
//!
//! ## Overview
//!
//! Every user belongs to one group. Folders (holding credentials) and
//! documents each carry a permission matrix with at most one entry per
//! group. The [`Vault`] decides, for an actor and an operation on a
//! resource, whether to allow it:
//!
//! - **Admin bypass**: an admin is allowed everything, with no lookup
//! - **Default-deny**: a group without an entry has no access
//! - **Download implies view**: on documents, applied at evaluation time
//!
//! Administrators edit a resource's whole matrix with
//! [`Vault::replace_folder_matrix`] / [`Vault::replace_document_matrix`],
//! which apply every entry or none.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vault_acl::{Actor, FolderFlags, FolderGrant, FolderOp, Target, Vault, VaultConfig};
//! use vault_acl::core::UserId;
//!
//! async fn example() -> vault_acl::Result<()> {
//!     let vault = Vault::open("vault.db", VaultConfig::default())?;
//!
//!     vault.create_group("junior", "").await?;
//!     let prod = vault.create_folder("prod", "production").await?;
//!     vault
//!         .replace_folder_matrix(prod.id, &[FolderGrant::new("junior", FolderFlags::read_only())])
//!         .await?;
//!
//!     let actor = Actor::user(UserId::new(7), "junior");
//!     let verdict = vault.explain(&actor, Target::folder(prod.id, FolderOp::Write)).await?;
//!     println!("{verdict}");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vault_acl::core` - Identities, flags, records, validation
//! - `vault_acl::store` - Storage abstraction, SQLite and in-memory backends
//! - `vault_acl::perms` - Pure evaluator and matrix views

pub mod error;
pub mod vault;

// Re-export component crates
pub use vault_acl_core as core;
pub use vault_acl_perms as perms;
pub use vault_acl_store as store;

// Re-export main types for convenience
pub use error::{Result, VaultError};
pub use vault::{DocumentAccess, FolderAccess, Vault, VaultConfig};

// Re-export commonly used types
pub use vault_acl_core::{
    Actor, DocumentFlags, DocumentGrant, DocumentOp, FolderFlags, FolderGrant, FolderOp, Role,
    Target,
};
pub use vault_acl_perms::{Basis, Decision, DocumentMatrix, FolderMatrix, Source, Verdict};
pub use vault_acl_store::{MemoryStore, SqliteOptions, SqliteStore, Store};
