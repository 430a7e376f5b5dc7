//! Strong identifier types.
//!
//! All identifiers are newtypes over the storage row id so that a folder id
//! can never be passed where a document id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create an identifier from a raw row id.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Get the raw row id.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// Identifier of a registered user.
    UserId,
    "UserId"
);
define_id!(
    /// Identifier of a group in the registry.
    GroupId,
    "GroupId"
);
define_id!(
    /// Identifier of a credential folder.
    FolderId,
    "FolderId"
);
define_id!(
    /// Identifier of a stored credential.
    CredentialId,
    "CredentialId"
);
define_id!(
    /// Identifier of an uploaded document.
    DocumentId,
    "DocumentId"
);

/// Get current time in milliseconds since the Unix epoch.
///
/// A clock set before the epoch yields 0 rather than panicking.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_debug() {
        let id = FolderId::new(42);
        assert_eq!(format!("{}", id), "42");
        assert_eq!(format!("{:?}", id), "FolderId(42)");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = DocumentId::from(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let back: DocumentId = serde_json::from_str("7").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_now_millis_is_positive() {
        assert!(now_millis() > 1_600_000_000_000);
    }
}
