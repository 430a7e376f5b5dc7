//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a vault seeded with the usual
//! groups, one actor per role, and a pair of folders.

use vault_acl::{Actor, Result, Vault, VaultConfig};
use vault_acl_core::{FolderId, NewCredential, NewUser, Role, Secret};
use vault_acl_store::{MemoryStore, SqliteStore, Store};

/// Groups every fixture registers, in name order.
pub const FIXTURE_GROUPS: [&str; 3] = ["junior", "qa", "senior"];

/// A seeded vault with actors and folders.
///
/// Folders start with empty matrices; tests grant what they need.
pub struct VaultFixture<S: Store> {
    pub vault: Vault<S>,
    pub admin: Actor,
    pub junior: Actor,
    pub senior: Actor,
    pub qa: Actor,
    pub prod: FolderId,
    pub staging: FolderId,
}

impl VaultFixture<MemoryStore> {
    /// Fixture over an in-memory store.
    pub async fn memory() -> Result<Self> {
        Self::seed(MemoryStore::new(), VaultConfig::default()).await
    }
}

impl VaultFixture<SqliteStore> {
    /// Fixture over an in-memory SQLite database.
    pub async fn sqlite() -> Result<Self> {
        Self::seed(SqliteStore::open_memory()?, VaultConfig::default()).await
    }
}

impl<S: Store> VaultFixture<S> {
    /// Register the fixture groups, users and folders on `store`.
    pub async fn seed(store: S, config: VaultConfig) -> Result<Self> {
        let vault = Vault::new(store, config);
        for name in FIXTURE_GROUPS {
            vault.create_group(name, "").await?;
        }

        let admin = user(&vault, "admin@example.com", Role::Admin, "senior").await?;
        let junior = user(&vault, "junior@example.com", Role::User, "junior").await?;
        let senior = user(&vault, "senior@example.com", Role::User, "senior").await?;
        let qa = user(&vault, "qa@example.com", Role::User, "qa").await?;

        let prod = vault.create_folder("prod", "production").await?.id;
        let staging = vault.create_folder("staging", "").await?.id;

        Ok(Self {
            vault,
            admin,
            junior,
            senior,
            qa,
            prod,
            staging,
        })
    }

    /// Actors without the admin role.
    pub fn users(&self) -> [&Actor; 3] {
        [&self.junior, &self.senior, &self.qa]
    }
}

async fn user<S: Store>(vault: &Vault<S>, email: &str, role: Role, group: &str) -> Result<Actor> {
    let user = vault.create_user(&NewUser::new(email, role, group)).await?;
    Ok(Actor::from(&user))
}

/// A credential ready to store in `folder`.
pub fn sample_credential(folder: FolderId, service: &str) -> NewCredential {
    NewCredential {
        folder_id: folder,
        service_name: service.to_string(),
        username: "svc".to_string(),
        password: Secret::from("correct horse battery staple"),
        notes: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fixture() {
        let f = VaultFixture::memory().await.unwrap();
        assert!(f.admin.is_admin());
        assert_eq!(f.junior.group, "junior");
        assert_eq!(f.vault.list_groups().await.unwrap().len(), FIXTURE_GROUPS.len());
        assert_eq!(f.vault.list_folders().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_fixture() {
        let f = VaultFixture::sqlite().await.unwrap();
        assert_eq!(f.users().len(), 3);
        assert!(f.vault.folder_matrix(f.prod).await.unwrap().explicit().next().is_none());
    }
}
