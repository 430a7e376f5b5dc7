//! The Vault: unified API for group-based access control.
//!
//! The Vault brings together the group registry, the per-resource permission
//! matrices and the access evaluator over any [`Store`] backend.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use vault_acl_core::{
    normalize_name, validate_batch, validate_new_credential, validate_new_user, Actor, Credential,
    CredentialId, CredentialUpdate, Document, DocumentFlags, DocumentGrant, DocumentId, Folder,
    FolderFlags, FolderGrant, FolderId, FolderOp, Group, GroupId, GroupUpdate,
    NewCredential, NewDocument, NewFolder, NewGroup, NewUser, Target, User, UserId,
    ValidationError,
};
use vault_acl_perms::{
    effective_document_flags, effective_folder_flags, evaluate_document, evaluate_folder,
    Decision, DocumentMatrix, FolderMatrix, Verdict,
};
use vault_acl_store::{SqliteStore, Store, StoreError, StoreExt};

use crate::error::{Result, VaultError};

/// Configuration for the Vault.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Grants applied to every new document, in the same transaction as the
    /// insert. Grants naming an unregistered group are skipped.
    pub document_defaults: Vec<DocumentGrant>,
    /// Largest batch `replace_*_matrix` accepts.
    pub max_batch_entries: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            document_defaults: Vec::new(),
            max_batch_entries: 256,
        }
    }
}

/// A folder together with what the requesting actor may do in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderAccess {
    pub folder: Folder,
    pub access: FolderFlags,
}

/// A document together with what the requesting actor may do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAccess {
    pub document: Document,
    /// Effective flags: download implies view.
    pub access: DocumentFlags,
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Managing groups and users
/// - Managing folders, documents and their permission matrices
/// - Evaluating and explaining access
/// - Credential operations gated by the evaluator
///
/// Every evaluation reads the store; nothing is cached between calls.
pub struct Vault<S: Store> {
    store: Arc<S>,
    config: VaultConfig,
}

impl<S: Store> Clone for Vault<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl Vault<SqliteStore> {
    /// Open a SQLite-backed vault at the given path.
    pub fn open(path: impl AsRef<Path>, config: VaultConfig) -> Result<Self> {
        let store = SqliteStore::open(path)?;
        Ok(Self::new(store, config))
    }
}

impl<S: Store> Vault<S> {
    /// Create a new vault over a store.
    pub fn new(store: S, config: VaultConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Group Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a group. The name is trimmed before it is checked and stored.
    pub async fn create_group(&self, name: &str, description: &str) -> Result<Group> {
        let name = normalize_name("group", name)?;
        let group = self
            .store
            .create_group(&NewGroup::new(name, description))
            .await?;

        info!(group = %group.name, id = %group.id, "group created");
        Ok(group)
    }

    /// Rename and/or re-describe a group.
    ///
    /// A rename carries the group's users and permission entries along.
    pub async fn update_group(&self, id: GroupId, update: GroupUpdate) -> Result<Group> {
        if update.is_empty() {
            return self.group(id).await;
        }

        let update = GroupUpdate {
            name: update
                .name
                .map(|n| normalize_name("group", &n))
                .transpose()?,
            description: update.description,
        };
        let group = self.store.update_group(id, &update).await?;

        info!(group = %group.name, id = %id, "group updated");
        Ok(group)
    }

    /// Delete a group.
    ///
    /// Refused with [`VaultError::GroupInUse`] while any user belongs to it.
    /// Otherwise its permission entries are removed with it, so a later group
    /// reusing the name starts with no access.
    pub async fn delete_group(&self, id: GroupId) -> Result<Group> {
        let group = self.store.delete_group(id).await?;
        info!(group = %group.name, id = %id, "group deleted");
        Ok(group)
    }

    pub async fn group(&self, id: GroupId) -> Result<Group> {
        self.store
            .get_group(id)
            .await?
            .ok_or_else(|| VaultError::not_found("group", id))
    }

    pub async fn group_by_name(&self, name: &str) -> Result<Option<Group>> {
        Ok(self.store.get_group_by_name(name.trim()).await?)
    }

    /// All groups, ordered by name.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.store.list_groups().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a user in an existing group.
    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let user = validate_new_user(user)?;
        let created = self.store.create_user(&user).await?;

        info!(user = %created.id, group = %created.group, role = %created.role, "user created");
        Ok(created)
    }

    pub async fn user(&self, id: UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| VaultError::not_found("user", id))
    }

    /// Move a user to another group.
    pub async fn set_user_group(&self, id: UserId, group: &str) -> Result<User> {
        let group = normalize_name("group", group)?;
        let user = self.store.set_user_group(id, &group).await?;

        info!(user = %id, group = %user.group, "user moved");
        Ok(user)
    }

    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        self.store.delete_user(id).await?;
        info!(user = %id, "user deleted");
        Ok(())
    }

    /// All users, ordered by email.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Folders
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a folder. It starts with an empty matrix.
    pub async fn create_folder(&self, name: &str, description: &str) -> Result<Folder> {
        let name = normalize_name("folder", name)?;
        let folder = self
            .store
            .create_folder(&NewFolder::new(name, description))
            .await?;

        info!(folder = %folder.id, name = %folder.name, "folder created");
        Ok(folder)
    }

    pub async fn folder(&self, id: FolderId) -> Result<Folder> {
        self.store
            .get_folder(id)
            .await?
            .ok_or_else(|| VaultError::not_found("folder", id))
    }

    /// All folders, ordered by name.
    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.store.list_folders().await?)
    }

    /// Delete a folder with its permission entries and credentials.
    pub async fn delete_folder(&self, id: FolderId) -> Result<()> {
        self.store.delete_folder(id).await?;
        info!(folder = %id, "folder deleted");
        Ok(())
    }

    /// The folder's matrix: one cell per registered group.
    pub async fn folder_matrix(&self, id: FolderId) -> Result<FolderMatrix> {
        let rows = self.store.folder_matrix_rows(id).await?;
        Ok(FolderMatrix::build(id, rows.groups, rows.stored))
    }

    /// Set one group's entry on a folder. Idempotent.
    pub async fn upsert_folder_permission(&self, folder: FolderId, grant: FolderGrant) -> Result<()> {
        let grant = FolderGrant::new(normalize_name("group", &grant.group)?, grant.flags);
        self.store
            .upsert_folder_permission(folder, grant.clone())
            .await?;

        info!(folder = %folder, group = %grant.group, flags = ?grant.flags, "folder permission set");
        Ok(())
    }

    /// Apply a whole permission panel to a folder in one transaction.
    ///
    /// Each listed group's entry is upserted; groups not listed keep their
    /// entries. On any failure no entry changes.
    pub async fn replace_folder_matrix(&self, folder: FolderId, entries: &[FolderGrant]) -> Result<()> {
        validate_batch(entries, self.config.max_batch_entries)?;
        let grants = entries
            .iter()
            .map(|g| Ok(FolderGrant::new(normalize_name("group", &g.group)?, g.flags)))
            .collect::<std::result::Result<Vec<_>, ValidationError>>()?;

        let resource = format!("folder {folder}");
        match self.store.replace_folder_permissions(folder, &grants).await {
            Ok(()) => {
                info!(folder = %folder, entries = grants.len(), "folder matrix replaced");
                Ok(())
            }
            Err(err) => Err(batch_failure(resource, grants.len(), err)),
        }
    }

    /// Folders the actor may read, each with the actor's effective flags.
    ///
    /// Admins see every folder with full access.
    pub async fn folders_for(&self, actor: &Actor) -> Result<Vec<FolderAccess>> {
        let folders = self.store.list_folders().await?;
        let mut visible = Vec::with_capacity(folders.len());

        for folder in folders {
            let entry = if actor.is_admin() {
                None
            } else {
                self.store.folder_permission(folder.id, &actor.group).await?
            };
            let access = effective_folder_flags(actor, entry.as_ref());
            if access.can_read {
                visible.push(FolderAccess { folder, access });
            }
        }

        Ok(visible)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Record an uploaded document. Configured default grants are applied in
    /// the same transaction.
    pub async fn create_document(&self, doc: &NewDocument) -> Result<Document> {
        if doc.filename.trim().is_empty() {
            return Err(ValidationError::EmptyField("filename").into());
        }
        let created = self
            .store
            .create_document(doc, &self.config.document_defaults)
            .await?;

        info!(
            document = %created.id,
            name = %created.original_filename,
            defaults = self.config.document_defaults.len(),
            "document created"
        );
        Ok(created)
    }

    pub async fn document(&self, id: DocumentId) -> Result<Document> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| VaultError::not_found("document", id))
    }

    /// All documents, newest first.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        Ok(self.store.list_documents().await?)
    }

    /// Delete a document with its permission entries.
    pub async fn delete_document(&self, id: DocumentId) -> Result<()> {
        self.store.delete_document(id).await?;
        info!(document = %id, "document deleted");
        Ok(())
    }

    /// The document's matrix. Cells hold stored flags; see
    /// [`DocumentMatrix::effective`] for what the evaluator acts on.
    pub async fn document_matrix(&self, id: DocumentId) -> Result<DocumentMatrix> {
        let rows = self.store.document_matrix_rows(id).await?;
        Ok(DocumentMatrix::build(id, rows.groups, rows.stored))
    }

    /// Set one group's entry on a document. Flags are stored as given.
    pub async fn upsert_document_permission(&self, doc: DocumentId, grant: DocumentGrant) -> Result<()> {
        let grant = DocumentGrant::new(normalize_name("group", &grant.group)?, grant.flags);
        self.store
            .upsert_document_permission(doc, grant.clone())
            .await?;

        info!(document = %doc, group = %grant.group, flags = ?grant.flags, "document permission set");
        Ok(())
    }

    /// Apply a whole permission panel to a document in one transaction.
    pub async fn replace_document_matrix(
        &self,
        doc: DocumentId,
        entries: &[DocumentGrant],
    ) -> Result<()> {
        validate_batch(entries, self.config.max_batch_entries)?;
        let grants = entries
            .iter()
            .map(|g| Ok(DocumentGrant::new(normalize_name("group", &g.group)?, g.flags)))
            .collect::<std::result::Result<Vec<_>, ValidationError>>()?;

        let resource = format!("document {doc}");
        match self.store.replace_document_permissions(doc, &grants).await {
            Ok(()) => {
                info!(document = %doc, entries = grants.len(), "document matrix replaced");
                Ok(())
            }
            Err(err) => Err(batch_failure(resource, grants.len(), err)),
        }
    }

    /// Documents the actor may view, newest first, with effective flags.
    pub async fn documents_for(&self, actor: &Actor) -> Result<Vec<DocumentAccess>> {
        let documents = self.store.list_documents().await?;
        let mut visible = Vec::with_capacity(documents.len());

        for document in documents {
            let entry = if actor.is_admin() {
                None
            } else {
                self.store
                    .document_permission(document.id, &actor.group)
                    .await?
            };
            let access = effective_document_flags(actor, entry.as_ref());
            if access.can_view {
                visible.push(DocumentAccess { document, access });
            }
        }

        Ok(visible)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    /// Decide whether `actor` may perform `target`.
    pub async fn evaluate(&self, actor: &Actor, target: Target) -> Result<Decision> {
        Ok(self.explain(actor, target).await?.decision)
    }

    /// Decide, and report which rule decided.
    ///
    /// Admins are answered without a lookup. Otherwise exactly one entry is
    /// read: the one for the actor's group on the target resource.
    pub async fn explain(&self, actor: &Actor, target: Target) -> Result<Verdict> {
        let verdict = match target {
            Target::Folder { id, op } => {
                let entry = if actor.is_admin() {
                    None
                } else {
                    self.store.folder_permission(id, &actor.group).await?
                };
                evaluate_folder(actor, id, op, entry.as_ref())
            }
            Target::Document { id, op } => {
                let entry = if actor.is_admin() {
                    None
                } else {
                    self.store.document_permission(id, &actor.group).await?
                };
                evaluate_document(actor, id, op, entry.as_ref())
            }
        };

        debug!(
            actor = %actor.id,
            group = %actor.group,
            target = %target,
            decision = %verdict.decision,
            basis = ?verdict.basis,
            "access evaluated"
        );
        Ok(verdict)
    }

    /// Like [`Vault::explain`], but a deny becomes [`VaultError::Denied`].
    pub async fn authorize(&self, actor: &Actor, target: Target) -> Result<Verdict> {
        let verdict = self.explain(actor, target).await?;
        if verdict.is_allowed() {
            Ok(verdict)
        } else {
            debug!(actor = %actor.id, target = %target, "access denied");
            Err(VaultError::Denied(verdict))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a credential. Requires write on its folder.
    pub async fn create_credential(&self, actor: &Actor, cred: &NewCredential) -> Result<Credential> {
        validate_new_credential(cred)?;
        self.authorize(actor, Target::folder(cred.folder_id, FolderOp::Write))
            .await?;

        let created = self.store.create_credential(cred, actor.id).await?;
        info!(credential = %created.id, folder = %created.folder_id, actor = %actor.id, "credential created");
        Ok(created)
    }

    /// Fetch a credential. Requires read on its folder.
    pub async fn credential(&self, actor: &Actor, id: CredentialId) -> Result<Credential> {
        let cred = self.stored_credential(id).await?;
        self.authorize(actor, Target::folder(cred.folder_id, FolderOp::Read))
            .await?;
        Ok(cred)
    }

    /// Update a credential. Requires write on its folder, and on the
    /// destination folder when it moves.
    pub async fn update_credential(
        &self,
        actor: &Actor,
        id: CredentialId,
        update: &CredentialUpdate,
    ) -> Result<Credential> {
        validate_credential_update(update)?;

        let current = self.stored_credential(id).await?;
        self.authorize(actor, Target::folder(current.folder_id, FolderOp::Write))
            .await?;
        if let Some(dest) = update.folder_id.filter(|f| *f != current.folder_id) {
            self.authorize(actor, Target::folder(dest, FolderOp::Write))
                .await?;
        }

        let updated = self.store.update_credential(id, update).await?;
        info!(credential = %id, folder = %updated.folder_id, actor = %actor.id, "credential updated");
        Ok(updated)
    }

    /// Delete a credential. Requires delete on its folder.
    pub async fn delete_credential(&self, actor: &Actor, id: CredentialId) -> Result<()> {
        let cred = self.stored_credential(id).await?;
        self.authorize(actor, Target::folder(cred.folder_id, FolderOp::Delete))
            .await?;

        self.store.delete_credential(id).await?;
        info!(credential = %id, actor = %actor.id, "credential deleted");
        Ok(())
    }

    /// Credentials of one folder, newest first.
    ///
    /// An actor without read access gets an empty list rather than an error.
    pub async fn credentials_in_folder(&self, actor: &Actor, folder: FolderId) -> Result<Vec<Credential>> {
        let verdict = self
            .explain(actor, Target::folder(folder, FolderOp::Read))
            .await?;
        if !verdict.is_allowed() {
            return Ok(Vec::new());
        }
        Ok(self.store.credentials_in_folder(folder).await?)
    }

    /// Every credential the actor may read, newest first.
    pub async fn visible_credentials(&self, actor: &Actor) -> Result<Vec<Credential>> {
        if actor.is_admin() {
            return Ok(self.store.list_credentials().await?);
        }
        Ok(self.store.credentials_readable_by(&actor.group).await?)
    }

    async fn stored_credential(&self, id: CredentialId) -> Result<Credential> {
        self.store
            .get_credential(id)
            .await?
            .ok_or_else(|| VaultError::not_found("credential", id))
    }
}

/// Map a failed batch onto the error taxonomy.
///
/// Rejections the transaction detects keep their own variant; anything the
/// storage layer raised mid-batch is a rolled-back partial failure.
fn batch_failure(resource: String, attempted: usize, err: StoreError) -> VaultError {
    match err {
        StoreError::NotFound { .. } | StoreError::GroupNotFound(_) | StoreError::Validation(_) => {
            debug!(resource = %resource, error = %err, "batch rejected");
            VaultError::from(err)
        }
        source => {
            warn!(resource = %resource, attempted, error = %source, "batch rolled back");
            VaultError::PartialFailure {
                resource,
                attempted,
                source,
            }
        }
    }
}

fn validate_credential_update(update: &CredentialUpdate) -> std::result::Result<(), ValidationError> {
    if update
        .service_name
        .as_ref()
        .is_some_and(|s| s.trim().is_empty())
    {
        return Err(ValidationError::EmptyField("service_name"));
    }
    if update.username.as_ref().is_some_and(|s| s.trim().is_empty()) {
        return Err(ValidationError::EmptyField("username"));
    }
    if update.password.as_ref().is_some_and(|p| p.is_empty()) {
        return Err(ValidationError::EmptyField("password"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_acl_core::{DocumentOp, Role, Secret};
    use vault_acl_store::MemoryStore;

    async fn vault() -> Vault<MemoryStore> {
        let vault = Vault::new(MemoryStore::new(), VaultConfig::default());
        for name in ["junior", "senior"] {
            vault.create_group(name, "").await.unwrap();
        }
        vault
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: VaultConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_batch_entries, 256);
        assert!(config.document_defaults.is_empty());
    }

    #[test]
    fn test_config_document_defaults_wire_shape() {
        let config: VaultConfig = serde_json::from_str(
            r#"{"document_defaults": [{"group": "senior", "can_view": true, "can_download": false}]}"#,
        )
        .unwrap();
        assert_eq!(
            config.document_defaults,
            vec![DocumentGrant::new("senior", DocumentFlags::new(true, false))]
        );
    }

    #[tokio::test]
    async fn test_group_name_trimmed() {
        let vault = vault().await;
        let qa = vault.create_group("  qa  ", "").await.unwrap();
        assert_eq!(qa.name, "qa");

        let err = vault.create_group("qa", "").await.unwrap_err();
        assert!(matches!(err, VaultError::DuplicateName { entity: "group", .. }));

        let err = vault.create_group("   ", "").await.unwrap_err();
        assert!(matches!(err, VaultError::Validation(ValidationError::EmptyName { .. })));
    }

    #[tokio::test]
    async fn test_batch_rejects_duplicate_group() {
        let vault = vault().await;
        let folder = vault.create_folder("prod", "").await.unwrap();

        let err = vault
            .replace_folder_matrix(
                folder.id,
                &[
                    FolderGrant::new("junior", FolderFlags::ALL),
                    FolderGrant::new(" junior", FolderFlags::NONE),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Validation(ValidationError::DuplicateBatchEntry(g)) if g == "junior"
        ));
    }

    #[tokio::test]
    async fn test_batch_size_limit() {
        let vault = Vault::new(
            MemoryStore::new(),
            VaultConfig {
                max_batch_entries: 1,
                ..VaultConfig::default()
            },
        );
        let folder = vault.create_folder("prod", "").await.unwrap();
        let err = vault
            .replace_folder_matrix(
                folder.id,
                &[
                    FolderGrant::new("a", FolderFlags::ALL),
                    FolderGrant::new("b", FolderFlags::ALL),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Validation(ValidationError::BatchTooLarge { len: 2, max: 1 })
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_requires_resource() {
        let vault = vault().await;
        let folder = vault.create_folder("prod", "").await.unwrap();
        vault.replace_folder_matrix(folder.id, &[]).await.unwrap();

        let err = vault
            .replace_folder_matrix(FolderId::new(404), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound { entity: "folder", .. }));
    }

    #[tokio::test]
    async fn test_admin_answered_without_entry() {
        let vault = vault().await;
        let admin = Actor::admin(UserId::new(1), "senior");
        let verdict = vault
            .explain(&admin, Target::document(DocumentId::new(99), DocumentOp::Download))
            .await
            .unwrap();
        assert!(verdict.is_allowed());
    }

    #[tokio::test]
    async fn test_move_needs_write_on_both_folders() {
        let vault = vault().await;
        let prod = vault.create_folder("prod", "").await.unwrap().id;
        let staging = vault.create_folder("staging", "").await.unwrap().id;
        vault
            .upsert_folder_permission(prod, FolderGrant::new("senior", FolderFlags::ALL))
            .await
            .unwrap();
        vault
            .upsert_folder_permission(staging, FolderGrant::new("senior", FolderFlags::read_only()))
            .await
            .unwrap();

        let user = vault
            .create_user(&NewUser::new("s@example.com", Role::User, "senior"))
            .await
            .unwrap();
        let actor = Actor::from(&user);

        let cred = vault
            .create_credential(
                &actor,
                &NewCredential {
                    folder_id: prod,
                    service_name: "db".into(),
                    username: "root".into(),
                    password: Secret::from("pw"),
                    notes: String::new(),
                },
            )
            .await
            .unwrap();

        let err = vault
            .update_credential(
                &actor,
                cred.id,
                &CredentialUpdate {
                    folder_id: Some(staging),
                    ..CredentialUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Denied(ref v) if v.target == Target::folder(staging, FolderOp::Write)));
        assert_eq!(vault.credential(&actor, cred.id).await.unwrap().folder_id, prod);
    }
}
