//! Error types for the vault core.

use thiserror::Error;

/// Input validation failures. Always a client error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{entity} name must not be empty")]
    EmptyName { entity: &'static str },

    #[error("{entity} name is {len} characters, maximum is {max}")]
    NameTooLong {
        entity: &'static str,
        len: usize,
        max: usize,
    },

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("group '{0}' appears more than once in the batch")]
    DuplicateBatchEntry(String),

    #[error("batch has {len} entries, maximum is {max}")]
    BatchTooLarge { len: usize, max: usize },
}
