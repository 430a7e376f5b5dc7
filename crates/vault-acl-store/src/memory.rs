//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use vault_acl_core::{
    now_millis, Credential, CredentialId, CredentialUpdate, Document, DocumentFlags, DocumentGrant,
    DocumentId, Folder, FolderFlags, FolderGrant, FolderId, Group, GroupId, GroupUpdate,
    NewCredential, NewDocument, NewFolder, NewGroup, NewUser, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{MatrixRows, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock: every
/// mutation holds the write lock for its whole duration, which gives the same
/// all-or-nothing visibility as a SQLite transaction.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    groups: BTreeMap<GroupId, Group>,
    users: BTreeMap<UserId, User>,
    folders: BTreeMap<FolderId, Folder>,
    documents: BTreeMap<DocumentId, Document>,
    credentials: BTreeMap<CredentialId, Credential>,

    /// Permission rows keyed by (resource, group name).
    folder_permissions: BTreeMap<(FolderId, String), FolderFlags>,
    document_permissions: BTreeMap<(DocumentId, String), DocumentFlags>,

    /// Last id handed out per table. Ids are never reused.
    next_ids: IdCounters,
}

#[derive(Default)]
struct IdCounters {
    group: i64,
    user: i64,
    folder: i64,
    document: i64,
    credential: i64,
}

fn bump(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl MemoryStoreInner {
    fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.values().find(|g| g.name == name)
    }

    fn group_exists(&self, name: &str) -> bool {
        self.group_by_name(name).is_some()
    }

    fn members(&self, name: &str) -> u64 {
        self.users.values().filter(|u| u.group == name).count() as u64
    }

    fn require_folder(&self, id: FolderId) -> Result<()> {
        if self.folders.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::not_found("folder", id))
        }
    }

    fn require_document(&self, id: DocumentId) -> Result<()> {
        if self.documents.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::not_found("document", id))
        }
    }

    fn group_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.groups.values().map(|g| g.name.clone()).collect();
        names.sort();
        names
    }

    // BTreeMap order puts the rows of one resource together, sorted by group.
    fn folder_grants(&self, folder: FolderId) -> Vec<FolderGrant> {
        self.folder_permissions
            .iter()
            .filter(|((f, _), _)| *f == folder)
            .map(|((_, g), flags)| FolderGrant::new(g.clone(), *flags))
            .collect()
    }

    fn document_grants(&self, doc: DocumentId) -> Vec<DocumentGrant> {
        self.document_permissions
            .iter()
            .filter(|((d, _), _)| *d == doc)
            .map(|((_, g), flags)| DocumentGrant::new(g.clone(), *flags))
            .collect()
    }

    /// Re-key every permission row of `from` to `to`.
    fn rename_references(&mut self, from: &str, to: &str) {
        for user in self.users.values_mut().filter(|u| u.group == from) {
            user.group = to.to_string();
        }

        let folder_keys: Vec<_> = self
            .folder_permissions
            .keys()
            .filter(|(_, g)| g == from)
            .cloned()
            .collect();
        for key in folder_keys {
            if let Some(flags) = self.folder_permissions.remove(&key) {
                self.folder_permissions.insert((key.0, to.to_string()), flags);
            }
        }

        let document_keys: Vec<_> = self
            .document_permissions
            .keys()
            .filter(|(_, g)| g == from)
            .cloned()
            .collect();
        for key in document_keys {
            if let Some(flags) = self.document_permissions.remove(&key) {
                self.document_permissions
                    .insert((key.0, to.to_string()), flags);
            }
        }
    }
}

/// Newest first, ties broken by id.
fn newest_first(creds: &mut [Credential]) {
    creds.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let mut inner = self.write()?;

        if inner.group_exists(&group.name) {
            return Err(StoreError::duplicate("group", group.name.clone()));
        }

        let id = GroupId(bump(&mut inner.next_ids.group));
        let created = Group {
            id,
            name: group.name.clone(),
            description: group.description.clone(),
            created_at: now_millis(),
        };
        inner.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        Ok(self.read()?.groups.get(&id).cloned())
    }

    async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        Ok(self.read()?.group_by_name(name).cloned())
    }

    async fn update_group(&self, id: GroupId, update: &GroupUpdate) -> Result<Group> {
        let mut inner = self.write()?;

        let current = inner
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", id))?;

        let mut updated = current.clone();
        if let Some(name) = &update.name {
            if *name != current.name {
                if inner.group_exists(name) {
                    return Err(StoreError::duplicate("group", name.clone()));
                }
                inner.rename_references(&current.name, name);
                debug!(from = %current.name, to = %name, "group references rewritten");
                updated.name = name.clone();
            }
        }
        if let Some(description) = &update.description {
            updated.description = description.clone();
        }

        inner.groups.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_group(&self, id: GroupId) -> Result<Group> {
        let mut inner = self.write()?;

        let group = inner
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", id))?;

        let users = inner.members(&group.name);
        if users > 0 {
            return Err(StoreError::GroupInUse {
                name: group.name,
                users,
            });
        }

        inner.folder_permissions.retain(|(_, g), _| *g != group.name);
        inner.document_permissions.retain(|(_, g), _| *g != group.name);
        inner.groups.remove(&id);

        debug!(group = %group.name, "group permissions purged");
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<_> = self.read()?.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn count_group_members(&self, name: &str) -> Result<u64> {
        Ok(self.read()?.members(name))
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut inner = self.write()?;

        if !inner.group_exists(&user.group) {
            return Err(StoreError::GroupNotFound(user.group.clone()));
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::duplicate("user", user.email.clone()));
        }

        let id = UserId(bump(&mut inner.next_ids.user));
        let created = User {
            id,
            email: user.email.clone(),
            role: user.role,
            group: user.group.clone(),
            created_at: now_millis(),
        };
        inner.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn set_user_group(&self, id: UserId, group: &str) -> Result<User> {
        let mut inner = self.write()?;

        if !inner.users.contains_key(&id) {
            return Err(StoreError::not_found("user", id));
        }
        if !inner.group_exists(group) {
            return Err(StoreError::GroupNotFound(group.to_string()));
        }

        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("user", id))?;
        user.group = group.to_string();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        match self.write()?.users.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("user", id)),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<_> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn create_folder(&self, folder: &NewFolder) -> Result<Folder> {
        let mut inner = self.write()?;

        if inner.folders.values().any(|f| f.name == folder.name) {
            return Err(StoreError::duplicate("folder", folder.name.clone()));
        }

        let id = FolderId(bump(&mut inner.next_ids.folder));
        let created = Folder {
            id,
            name: folder.name.clone(),
            description: folder.description.clone(),
            created_at: now_millis(),
        };
        inner.folders.insert(id, created.clone());
        Ok(created)
    }

    async fn get_folder(&self, id: FolderId) -> Result<Option<Folder>> {
        Ok(self.read()?.folders.get(&id).cloned())
    }

    async fn list_folders(&self) -> Result<Vec<Folder>> {
        let mut folders: Vec<_> = self.read()?.folders.values().cloned().collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn delete_folder(&self, id: FolderId) -> Result<()> {
        let mut inner = self.write()?;
        inner.require_folder(id)?;

        inner.credentials.retain(|_, c| c.folder_id != id);
        inner.folder_permissions.retain(|(f, _), _| *f != id);
        inner.folders.remove(&id);

        debug!(folder = %id, "folder removed");
        Ok(())
    }

    async fn folder_permission(
        &self,
        folder: FolderId,
        group: &str,
    ) -> Result<Option<FolderFlags>> {
        let inner = self.read()?;
        Ok(inner
            .folder_permissions
            .get(&(folder, group.to_string()))
            .copied())
    }

    async fn folder_permissions(&self, folder: FolderId) -> Result<Vec<FolderGrant>> {
        let inner = self.read()?;
        inner.require_folder(folder)?;
        Ok(inner.folder_grants(folder))
    }

    async fn folder_matrix_rows(&self, folder: FolderId) -> Result<MatrixRows<FolderGrant>> {
        let inner = self.read()?;
        inner.require_folder(folder)?;
        Ok(MatrixRows {
            groups: inner.group_names(),
            stored: inner.folder_grants(folder),
        })
    }

    async fn replace_folder_permissions(
        &self,
        folder: FolderId,
        grants: &[FolderGrant],
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.require_folder(folder)?;

        // Check the whole batch before touching the map.
        if let Some(missing) = grants.iter().find(|g| !inner.group_exists(&g.group)) {
            return Err(StoreError::GroupNotFound(missing.group.clone()));
        }

        for grant in grants {
            inner
                .folder_permissions
                .insert((folder, grant.group.clone()), grant.flags);
        }
        Ok(())
    }

    async fn create_document(
        &self,
        doc: &NewDocument,
        defaults: &[DocumentGrant],
    ) -> Result<Document> {
        // Same bound as the SQLite INTEGER column.
        if i64::try_from(doc.size).is_err() {
            return Err(StoreError::InvalidData(format!(
                "document size {} out of range",
                doc.size
            )));
        }
        let mut inner = self.write()?;

        let id = DocumentId(bump(&mut inner.next_ids.document));
        let created = Document {
            id,
            filename: doc.filename.clone(),
            original_filename: doc.original_filename.clone(),
            size: doc.size,
            mime_type: doc.mime_type.clone(),
            uploaded_by: doc.uploaded_by,
            description: doc.description.clone(),
            created_at: now_millis(),
        };
        inner.documents.insert(id, created.clone());

        for grant in defaults {
            if inner.group_exists(&grant.group) {
                inner
                    .document_permissions
                    .insert((id, grant.group.clone()), grant.flags);
            } else {
                warn!(group = %grant.group, document = %id, "skipping default grant for unknown group");
            }
        }

        Ok(created)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.read()?.documents.get(&id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<_> = self.read()?.documents.values().cloned().collect();
        docs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(docs)
    }

    async fn delete_document(&self, id: DocumentId) -> Result<()> {
        let mut inner = self.write()?;
        inner.require_document(id)?;

        inner.document_permissions.retain(|(d, _), _| *d != id);
        inner.documents.remove(&id);

        debug!(document = %id, "document removed");
        Ok(())
    }

    async fn document_permission(
        &self,
        doc: DocumentId,
        group: &str,
    ) -> Result<Option<DocumentFlags>> {
        let inner = self.read()?;
        Ok(inner
            .document_permissions
            .get(&(doc, group.to_string()))
            .copied())
    }

    async fn document_permissions(&self, doc: DocumentId) -> Result<Vec<DocumentGrant>> {
        let inner = self.read()?;
        inner.require_document(doc)?;
        Ok(inner.document_grants(doc))
    }

    async fn document_matrix_rows(&self, doc: DocumentId) -> Result<MatrixRows<DocumentGrant>> {
        let inner = self.read()?;
        inner.require_document(doc)?;
        Ok(MatrixRows {
            groups: inner.group_names(),
            stored: inner.document_grants(doc),
        })
    }

    async fn replace_document_permissions(
        &self,
        doc: DocumentId,
        grants: &[DocumentGrant],
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.require_document(doc)?;

        if let Some(missing) = grants.iter().find(|g| !inner.group_exists(&g.group)) {
            return Err(StoreError::GroupNotFound(missing.group.clone()));
        }

        for grant in grants {
            inner
                .document_permissions
                .insert((doc, grant.group.clone()), grant.flags);
        }
        Ok(())
    }

    async fn create_credential(
        &self,
        cred: &NewCredential,
        created_by: UserId,
    ) -> Result<Credential> {
        let mut inner = self.write()?;
        inner.require_folder(cred.folder_id)?;

        let id = CredentialId(bump(&mut inner.next_ids.credential));
        let now = now_millis();
        let created = Credential {
            id,
            folder_id: cred.folder_id,
            service_name: cred.service_name.clone(),
            username: cred.username.clone(),
            password: cred.password.clone(),
            notes: cred.notes.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        };
        inner.credentials.insert(id, created.clone());
        Ok(created)
    }

    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>> {
        Ok(self.read()?.credentials.get(&id).cloned())
    }

    async fn update_credential(
        &self,
        id: CredentialId,
        update: &CredentialUpdate,
    ) -> Result<Credential> {
        let mut inner = self.write()?;

        if !inner.credentials.contains_key(&id) {
            return Err(StoreError::not_found("credential", id));
        }
        if let Some(folder_id) = update.folder_id {
            inner.require_folder(folder_id)?;
        }

        let cred = inner
            .credentials
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("credential", id))?;
        if let Some(folder_id) = update.folder_id {
            cred.folder_id = folder_id;
        }
        if let Some(service_name) = &update.service_name {
            cred.service_name = service_name.clone();
        }
        if let Some(username) = &update.username {
            cred.username = username.clone();
        }
        if let Some(password) = &update.password {
            cred.password = password.clone();
        }
        if let Some(notes) = &update.notes {
            cred.notes = notes.clone();
        }
        cred.updated_at = now_millis();

        Ok(cred.clone())
    }

    async fn delete_credential(&self, id: CredentialId) -> Result<()> {
        match self.write()?.credentials.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("credential", id)),
        }
    }

    async fn credentials_in_folder(&self, folder: FolderId) -> Result<Vec<Credential>> {
        let inner = self.read()?;
        inner.require_folder(folder)?;

        let mut creds: Vec<_> = inner
            .credentials
            .values()
            .filter(|c| c.folder_id == folder)
            .cloned()
            .collect();
        newest_first(&mut creds);
        Ok(creds)
    }

    async fn credentials_readable_by(&self, group: &str) -> Result<Vec<Credential>> {
        let inner = self.read()?;

        let mut creds: Vec<_> = inner
            .credentials
            .values()
            .filter(|c| {
                inner
                    .folder_permissions
                    .get(&(c.folder_id, group.to_string()))
                    .is_some_and(|flags| flags.can_read)
            })
            .cloned()
            .collect();
        newest_first(&mut creds);
        Ok(creds)
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>> {
        let mut creds: Vec<_> = self.read()?.credentials.values().cloned().collect();
        newest_first(&mut creds);
        Ok(creds)
    }
}
