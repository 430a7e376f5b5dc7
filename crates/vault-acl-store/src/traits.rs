//! Store trait: the abstract interface for vault persistence.
//!
//! This trait allows the engine to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests and embedding).

use async_trait::async_trait;
use vault_acl_core::{
    Credential, CredentialId, CredentialUpdate, Document, DocumentFlags, DocumentGrant, DocumentId,
    Folder, FolderFlags, FolderGrant, FolderId, Group, GroupId, GroupUpdate, NewCredential,
    NewDocument, NewFolder, NewGroup, NewUser, User, UserId,
};

use crate::error::Result;

/// Every registered group name together with one resource's stored entries,
/// read from a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRows<G> {
    /// Registered group names, sorted.
    pub groups: Vec<String>,
    /// Stored entries of the resource, sorted by group.
    pub stored: Vec<G>,
}

/// The Store trait: async interface for users, groups, resources and their
/// permission matrices.
///
/// # Contract
///
/// - **Validated input**: names and emails arrive normalized; the store
///   enforces existence and uniqueness, not shape.
/// - **One transaction per call**: every mutating method either commits all
///   of its effects or none. Concurrent readers observe the state before or
///   after a call, never in between.
/// - **Weak group references**: users and permission rows refer to groups by
///   name. Renames rewrite those references; deletes are refused while users
///   remain and otherwise purge the group's permission rows.
/// - **Default-deny**: a missing permission row is returned as `None`, never
///   synthesized.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Group Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a group. Fails with `DuplicateName` if the name is taken.
    async fn create_group(&self, group: &NewGroup) -> Result<Group>;

    async fn get_group(&self, id: GroupId) -> Result<Option<Group>>;

    async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>>;

    /// Rename and/or re-describe a group.
    ///
    /// A rename moves every user and permission row to the new name in the
    /// same transaction.
    async fn update_group(&self, id: GroupId, update: &GroupUpdate) -> Result<Group>;

    /// Delete a group, returning the removed record.
    ///
    /// Fails with `GroupInUse` while any user references it. Otherwise the
    /// group's folder and document permission rows are removed with it.
    async fn delete_group(&self, id: GroupId) -> Result<Group>;

    /// All groups, ordered by name.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// Number of users whose group is `name`.
    async fn count_group_members(&self, name: &str) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a user. The group must exist and the email must be unused.
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Move a user to another registered group.
    async fn set_user_group(&self, id: UserId, group: &str) -> Result<User>;

    async fn delete_user(&self, id: UserId) -> Result<()>;

    /// All users, ordered by email.
    async fn list_users(&self) -> Result<Vec<User>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Folders and their permission matrix
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_folder(&self, folder: &NewFolder) -> Result<Folder>;

    async fn get_folder(&self, id: FolderId) -> Result<Option<Folder>>;

    /// All folders, ordered by name.
    async fn list_folders(&self) -> Result<Vec<Folder>>;

    /// Delete a folder with all of its permission rows and credentials.
    async fn delete_folder(&self, id: FolderId) -> Result<()>;

    /// The stored entry for `(folder, group)`, if any.
    ///
    /// Does not check that the folder exists: a missing folder simply has no
    /// entries.
    async fn folder_permission(&self, folder: FolderId, group: &str)
        -> Result<Option<FolderFlags>>;

    /// All stored entries of a folder, ordered by group name.
    async fn folder_permissions(&self, folder: FolderId) -> Result<Vec<FolderGrant>>;

    /// Group names and the folder's entries from one snapshot, so a rename
    /// committed in between cannot split a group from its entry.
    async fn folder_matrix_rows(&self, folder: FolderId) -> Result<MatrixRows<FolderGrant>>;

    /// Upsert every grant in one transaction.
    ///
    /// Fails with `NotFound` for a missing folder and `GroupNotFound` for an
    /// unregistered group; in both cases no grant is applied.
    async fn replace_folder_permissions(&self, folder: FolderId, grants: &[FolderGrant])
        -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Documents and their permission matrix
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a document and apply `defaults` in the same transaction.
    ///
    /// Defaults naming an unregistered group are skipped.
    async fn create_document(&self, doc: &NewDocument, defaults: &[DocumentGrant])
        -> Result<Document>;

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>>;

    /// All documents, newest first.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Delete a document with all of its permission rows.
    async fn delete_document(&self, id: DocumentId) -> Result<()>;

    async fn document_permission(
        &self,
        doc: DocumentId,
        group: &str,
    ) -> Result<Option<DocumentFlags>>;

    async fn document_permissions(&self, doc: DocumentId) -> Result<Vec<DocumentGrant>>;

    async fn document_matrix_rows(&self, doc: DocumentId) -> Result<MatrixRows<DocumentGrant>>;

    async fn replace_document_permissions(
        &self,
        doc: DocumentId,
        grants: &[DocumentGrant],
    ) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a credential in an existing folder.
    async fn create_credential(&self, cred: &NewCredential, created_by: UserId)
        -> Result<Credential>;

    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>>;

    async fn update_credential(&self, id: CredentialId, update: &CredentialUpdate)
        -> Result<Credential>;

    async fn delete_credential(&self, id: CredentialId) -> Result<()>;

    /// Credentials of one folder, newest first. Fails if the folder is missing.
    async fn credentials_in_folder(&self, folder: FolderId) -> Result<Vec<Credential>>;

    /// Credentials in every folder where `group` holds `can_read`, newest first.
    async fn credentials_readable_by(&self, group: &str) -> Result<Vec<Credential>>;

    /// Every credential, newest first.
    async fn list_credentials(&self) -> Result<Vec<Credential>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Upsert a single folder entry.
    ///
    /// Identical to a one-entry batch, so repeated calls with the same flags
    /// leave the matrix unchanged.
    fn upsert_folder_permission(
        &self,
        folder: FolderId,
        grant: FolderGrant,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Upsert a single document entry.
    fn upsert_document_permission(
        &self,
        doc: DocumentId,
        grant: DocumentGrant,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn upsert_folder_permission(&self, folder: FolderId, grant: FolderGrant) -> Result<()> {
        self.replace_folder_permissions(folder, std::slice::from_ref(&grant))
            .await
    }

    async fn upsert_document_permission(
        &self,
        doc: DocumentId,
        grant: DocumentGrant,
    ) -> Result<()> {
        self.replace_document_permissions(doc, std::slice::from_ref(&grant))
            .await
    }
}
