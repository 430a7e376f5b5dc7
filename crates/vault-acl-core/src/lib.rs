//! # Vault ACL Core
//!
//! Pure domain types for the vault access-control engine: identities,
//! resources, permission flags and input validation.
//!
//! This crate contains no I/O and no storage. It is shared by the store,
//! the evaluator and the facade.
//!
//! ## Key Types
//!
//! - [`Actor`] - The authenticated identity behind a request (id, role, group)
//! - [`FolderFlags`] / [`DocumentFlags`] - Per-group capability sets
//! - [`FolderGrant`] / [`DocumentGrant`] - One row of a permission panel
//! - [`Target`] - A resource paired with the operation requested on it
//!
//! ## Default-deny
//!
//! A group with no entry on a resource holds no capability on it. The flag
//! types' `Default` is the all-false set, and matrix views present missing
//! entries that way.

pub mod error;
pub mod flags;
pub mod model;
pub mod types;
pub mod validation;

pub use error::ValidationError;
pub use flags::{
    DocumentFlags, DocumentGrant, DocumentOp, FolderFlags, FolderGrant, FolderOp, Grant,
    ResourceKind, Target,
};
pub use model::{
    Actor, Credential, CredentialUpdate, Document, Folder, Group, GroupUpdate, NewCredential,
    NewDocument, NewFolder, NewGroup, NewUser, Role, Secret, User,
};
pub use types::{now_millis, CredentialId, DocumentId, FolderId, GroupId, UserId};
pub use validation::{
    normalize_email, normalize_name, validate_batch, validate_new_credential, validate_new_user,
    MAX_NAME_LEN,
};
