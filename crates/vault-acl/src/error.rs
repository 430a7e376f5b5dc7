//! Error types for the Vault.

use thiserror::Error;
use vault_acl_core::ValidationError;
use vault_acl_perms::Verdict;
use vault_acl_store::StoreError;

/// Errors that can occur during Vault operations.
///
/// A denied access check is not an error: `evaluate` and `explain` return it
/// as a value. [`VaultError::Denied`] is only raised by operations that gate
/// themselves on the evaluator.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique name is already taken.
    #[error("{entity} '{name}' already exists")]
    DuplicateName { entity: &'static str, name: String },

    /// A grant or user references a group that is not registered.
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// The group still has members.
    #[error("group '{name}' is still referenced by {users} user(s); reassign its users first")]
    GroupInUse { name: String, users: u64 },

    /// A permission batch failed in storage and was rolled back.
    #[error("batch of {attempted} entries on {resource} rolled back: {source}")]
    PartialFailure {
        resource: String,
        attempted: usize,
        #[source]
        source: StoreError,
    },

    /// The evaluator denied the operation.
    #[error("access denied: {0}")]
    Denied(Verdict),

    /// Any other storage failure.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl VaultError {
    /// Whether the error was caused by the request rather than the system.
    ///
    /// Hosts map client errors to 4xx-style responses and the rest to 5xx.
    pub fn is_client_error(&self) -> bool {
        match self {
            VaultError::Validation(_)
            | VaultError::NotFound { .. }
            | VaultError::DuplicateName { .. }
            | VaultError::GroupNotFound(_)
            | VaultError::GroupInUse { .. }
            | VaultError::Denied(_) => true,
            VaultError::PartialFailure { .. } | VaultError::Store(_) => false,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        VaultError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => VaultError::NotFound { entity, id },
            StoreError::DuplicateName { entity, name } => VaultError::DuplicateName { entity, name },
            StoreError::GroupNotFound(name) => VaultError::GroupNotFound(name),
            StoreError::GroupInUse { name, users } => VaultError::GroupInUse { name, users },
            StoreError::Validation(e) => VaultError::Validation(e),
            other => VaultError::Store(other),
        }
    }
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_meaning() {
        let err = VaultError::from(StoreError::GroupInUse {
            name: "qa".into(),
            users: 2,
        });
        assert!(matches!(err, VaultError::GroupInUse { users: 2, .. }));
        assert!(err.is_client_error());
        assert!(err.to_string().contains("reassign its users first"));

        let err = VaultError::from(StoreError::Poisoned("writer".into()));
        assert!(matches!(err, VaultError::Store(_)));
        assert!(!err.is_client_error());
    }
}
