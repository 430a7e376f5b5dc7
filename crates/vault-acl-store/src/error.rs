//! Error types for the store module.

use thiserror::Error;
use vault_acl_core::ValidationError;

/// Errors that can occur during store operations.
///
/// The semantic variants (`NotFound`, `DuplicateName`, `GroupNotFound`,
/// `GroupInUse`) are detected inside the write transaction, so a reported
/// failure always means nothing was committed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique name is already taken.
    #[error("{entity} '{name}' already exists")]
    DuplicateName { entity: &'static str, name: String },

    /// A permission entry or user references a group that is not registered.
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// The group still has members and cannot be deleted.
    #[error("group '{name}' is still referenced by {users} user(s)")]
    GroupInUse { name: String, users: u64 },

    /// Input rejected by validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding shared state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// The blocking task running a SQLite call failed.
    #[error("blocking task failed: {0}")]
    Join(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn duplicate(entity: &'static str, name: impl Into<String>) -> Self {
        StoreError::DuplicateName {
            entity,
            name: name.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
