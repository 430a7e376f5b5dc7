//! Domain records: users, groups, folders, credentials, documents.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::{CredentialId, DocumentId, FolderId, GroupId, UserId};

/// Coarse capability flag carried by every actor.
///
/// Role is orthogonal to group: it gates administrative actions, while the
/// group gates resource access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated identity performing a request.
///
/// Produced by the host's authentication layer and passed explicitly into
/// every access check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
    pub group: String,
}

impl Actor {
    pub fn new(id: UserId, role: Role, group: impl Into<String>) -> Self {
        Self {
            id,
            role,
            group: group.into(),
        }
    }

    pub fn admin(id: UserId, group: impl Into<String>) -> Self {
        Self::new(id, Role::Admin, group)
    }

    pub fn user(id: UserId, group: impl Into<String>) -> Self {
        Self::new(id, Role::User, group)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.role, user.group.clone())
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    /// Name of the group this user belongs to.
    pub group: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub role: Role,
    pub group: String,
}

impl NewUser {
    pub fn new(email: impl Into<String>, role: Role, group: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role,
            group: group.into(),
        }
    }
}

/// A named cohort used as the unit of access grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Partial update of a group. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl GroupUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
        }
    }

    pub fn describe(description: impl Into<String>) -> Self {
        Self {
            name: None,
            description: Some(description.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// A credential folder. Owns its permission entries and its credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFolder {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewFolder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Opaque secret material. Never printed by `Debug`.
///
/// Stores persist these bytes exactly as given and never encrypt them.
/// Callers must encrypt the password before constructing a `Secret` and
/// decrypt after reading it back; only ciphertext should reach a store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(Bytes);

impl Secret {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Vec<u8>> for Secret {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

/// A stored credential. Access is derived entirely from its folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub folder_id: FolderId,
    pub service_name: String,
    pub username: String,
    pub password: Secret,
    pub notes: String,
    pub created_by: UserId,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for a new credential.
///
/// `password` must already be ciphertext: it is written to storage as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCredential {
    pub folder_id: FolderId,
    pub service_name: String,
    pub username: String,
    pub password: Secret,
    #[serde(default)]
    pub notes: String,
}

/// Partial update of a credential. Moving it to another folder requires
/// write access on both folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUpdate {
    pub folder_id: Option<FolderId>,
    pub service_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub notes: Option<String>,
}

/// Metadata of an uploaded document. The bytes live in external blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Storage key of the blob.
    pub filename: String,
    pub original_filename: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_by: UserId,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_by: UserId,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!(matches!(
            "root".parse::<Role>(),
            Err(ValidationError::UnknownRole(r)) if r == "root"
        ));
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::from("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.expose(), b"hunter2");
    }

    #[test]
    fn test_actor_from_user() {
        let user = User {
            id: UserId::new(5),
            email: "j@example.com".into(),
            role: Role::User,
            group: "junior".into(),
            created_at: 0,
        };
        let actor = Actor::from(&user);
        assert_eq!(actor.group, "junior");
        assert!(!actor.is_admin());
    }
}
