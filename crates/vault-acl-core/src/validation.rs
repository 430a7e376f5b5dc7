//! Input validation for names, emails and permission batches.
//!
//! Names are trimmed before they are checked or stored, so `" senior "` and
//! `"senior"` are the same group.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::flags::Grant;
use crate::model::{NewCredential, NewUser};

/// Maximum length of a group or folder name, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Trim and validate a group or folder name.
///
/// Returns the normalized name that should be stored.
pub fn normalize_name(entity: &'static str, raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName { entity });
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            entity,
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(name.to_string())
}

/// Trim, lowercase and sanity-check an email address.
///
/// This is a shape check only; deliverability is the host's concern.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ValidationError::InvalidEmail(raw.to_string()))
    }
}

/// Validate a new user. Returns the user with normalized email and group.
pub fn validate_new_user(user: &NewUser) -> Result<NewUser, ValidationError> {
    Ok(NewUser {
        email: normalize_email(&user.email)?,
        role: user.role,
        group: normalize_name("group", &user.group)?,
    })
}

/// Validate a new credential's required fields.
pub fn validate_new_credential(cred: &NewCredential) -> Result<(), ValidationError> {
    if cred.service_name.trim().is_empty() {
        return Err(ValidationError::EmptyField("service_name"));
    }
    if cred.username.trim().is_empty() {
        return Err(ValidationError::EmptyField("username"));
    }
    if cred.password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }
    Ok(())
}

/// Validate a permission batch before it reaches storage.
///
/// Checks:
/// - Size does not exceed `max_entries`
/// - No group is listed twice (one entry per group per panel save)
/// - Every group name is well-formed
///
/// Whether each group exists is checked inside the storage transaction.
pub fn validate_batch<G: Grant>(entries: &[G], max_entries: usize) -> Result<(), ValidationError> {
    if entries.len() > max_entries {
        return Err(ValidationError::BatchTooLarge {
            len: entries.len(),
            max: max_entries,
        });
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        let name = normalize_name("group", entry.group())?;
        if !seen.insert(name.clone()) {
            return Err(ValidationError::DuplicateBatchEntry(name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{FolderFlags, FolderGrant};
    use crate::model::Role;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_name_trims() {
        assert_eq!(normalize_name("group", "  senior ").unwrap(), "senior");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            normalize_name("group", "   "),
            Err(ValidationError::EmptyName { entity: "group" })
        );
    }

    #[test]
    fn test_long_name_rejected() {
        let long = "g".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            normalize_name("folder", &long),
            Err(ValidationError::NameTooLong { entity: "folder", .. })
        ));
    }

    #[test]
    fn test_email_normalized() {
        assert_eq!(
            normalize_email(" Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@b@c").is_err());
        assert!(normalize_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_new_user() {
        let user = validate_new_user(&NewUser::new("Bob@x.io", Role::User, " junior ")).unwrap();
        assert_eq!(user.email, "bob@x.io");
        assert_eq!(user.group, "junior");
    }

    #[test]
    fn test_batch_duplicate_rejected() {
        let batch = vec![
            FolderGrant::new("senior", FolderFlags::ALL),
            FolderGrant::new(" senior", FolderFlags::NONE),
        ];
        assert_eq!(
            validate_batch(&batch, 10),
            Err(ValidationError::DuplicateBatchEntry("senior".into()))
        );
    }

    #[test]
    fn test_batch_too_large() {
        let batch: Vec<_> = (0..3)
            .map(|i| FolderGrant::new(format!("g{i}"), FolderFlags::NONE))
            .collect();
        assert_eq!(
            validate_batch(&batch, 2),
            Err(ValidationError::BatchTooLarge { len: 3, max: 2 })
        );
        assert!(validate_batch(&batch, 3).is_ok());
    }

    #[test]
    fn test_empty_batch_is_valid() {
        let batch: Vec<FolderGrant> = Vec::new();
        assert!(validate_batch(&batch, 0).is_ok());
    }

    proptest! {
        #[test]
        fn test_normalized_names_are_stable(name in "[a-z][a-z0-9_-]{0,40}") {
            let padded = format!("  {name}\t");
            let once = normalize_name("group", &padded).unwrap();
            let twice = normalize_name("group", &once).unwrap();
            prop_assert_eq!(&once, &name);
            prop_assert_eq!(once, twice);
        }
    }
}
