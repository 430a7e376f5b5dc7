//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.
//!
//! Writes go through a single connection and run inside `BEGIN IMMEDIATE`
//! transactions. File-backed databases are switched to WAL mode and get a
//! small pool of read-only connections, so concurrent evaluations do not
//! queue behind each other or behind an administrator's batch; each reader
//! sees the last committed snapshot.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use vault_acl_core::{
    now_millis, Credential, CredentialId, CredentialUpdate, Document, DocumentFlags, DocumentGrant,
    DocumentId, Folder, FolderFlags, FolderGrant, FolderId, Group, GroupId, GroupUpdate,
    NewCredential, NewDocument, NewFolder, NewGroup, NewUser, Role, Secret, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{MatrixRows, Store};

/// Tuning knobs for [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Read-only connections opened next to the writer (file databases only).
    pub read_connections: usize,
    /// How long a connection waits on a locked database file before failing.
    pub busy_timeout: Duration,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            read_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutexes. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    inner: Arc<Connections>,
}

struct Connections {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
}

impl Connections {
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if self.readers.is_empty() {
            let conn = self
                .writer
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            return f(&conn);
        }

        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&conn)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .writer
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&mut conn)
    }
}

impl SqliteStore {
    /// Open a SQLite database at the given path with default options.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, SqliteOptions::default())
    }

    /// Open a SQLite database at the given path.
    pub fn open_with(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut writer = Connection::open(path)?;
        configure(&writer, &options)?;
        let mode: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        migration::migrate(&mut writer)?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(path = %path.display(), mode = %mode, "WAL unavailable, readers share the writer");
            return Ok(Self::from_parts(writer, Vec::new()));
        }

        let mut readers = Vec::with_capacity(options.read_connections);
        for _ in 0..options.read_connections {
            let reader = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            configure(&reader, &options)?;
            readers.push(Mutex::new(reader));
        }

        debug!(path = %path.display(), readers = readers.len(), "opened sqlite store");
        Ok(Self::from_parts(writer, readers))
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing. All reads share the writer connection.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure(&conn, &SqliteOptions::default())?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_parts(conn, Vec::new()))
    }

    fn from_parts(writer: Connection, readers: Vec<Mutex<Connection>>) -> Self {
        Self {
            inner: Arc::new(Connections {
                writer: Mutex::new(writer),
                readers,
                next_reader: AtomicUsize::new(0),
            }),
        }
    }

    /// Run a read-only closure on a pooled connection.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.read(f))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Run a closure on the writer connection.
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.write(f))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

fn configure(conn: &Connection, options: &SqliteOptions) -> Result<()> {
    conn.busy_timeout(options.busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

const GROUP_COLUMNS: &str = "id, name, description, created_at";
const USER_COLUMNS: &str = "id, email, role, group_name, created_at";
const FOLDER_COLUMNS: &str = "id, name, description, created_at";
const CREDENTIAL_COLUMNS: &str =
    "id, folder_id, service_name, username, password, notes, created_by, created_at, updated_at";
const DOCUMENT_COLUMNS: &str =
    "id, filename, original_filename, size, mime_type, uploaded_by, description, created_at";

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(2)?;
    let role: Role = role
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        role,
        group: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_folder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: FolderId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<Credential> {
    let password: Vec<u8> = row.get(4)?;
    Ok(Credential {
        id: CredentialId(row.get(0)?),
        folder_id: FolderId(row.get(1)?),
        service_name: row.get(2)?,
        username: row.get(3)?,
        password: Secret::from(password),
        notes: row.get(5)?,
        created_by: UserId(row.get(6)?),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let size: i64 = row.get(3)?;
    let size = u64::try_from(size).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(3, size))?;
    Ok(Document {
        id: DocumentId(row.get(0)?),
        filename: row.get(1)?,
        original_filename: row.get(2)?,
        size,
        mime_type: row.get(4)?,
        uploaded_by: UserId(row.get(5)?),
        description: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction helpers
// ─────────────────────────────────────────────────────────────────────────────

fn query_group(conn: &Connection, id: GroupId) -> Result<Option<Group>> {
    conn.query_row(
        &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1"),
        params![id.0],
        row_to_group,
    )
    .optional()
    .map_err(StoreError::from)
}

fn query_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.0],
        row_to_user,
    )
    .optional()
    .map_err(StoreError::from)
}

fn query_credential(conn: &Connection, id: CredentialId) -> Result<Option<Credential>> {
    conn.query_row(
        &format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = ?1"),
        params![id.0],
        row_to_credential,
    )
    .optional()
    .map_err(StoreError::from)
}

fn group_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM groups WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?)
}

fn count_members(conn: &Connection, name: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE group_name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn require_folder(conn: &Connection, id: FolderId) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM folders WHERE id = ?1)",
        params![id.0],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::not_found("folder", id))
    }
}

fn select_group_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM groups ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

fn select_folder_grants(conn: &Connection, folder: FolderId) -> Result<Vec<FolderGrant>> {
    let mut stmt = conn.prepare(
        "SELECT group_name, can_read, can_write, can_delete FROM folder_permissions
         WHERE folder_id = ?1 ORDER BY group_name",
    )?;
    let grants = stmt
        .query_map(params![folder.0], |row| {
            Ok(FolderGrant::new(
                row.get::<_, String>(0)?,
                FolderFlags::new(row.get(1)?, row.get(2)?, row.get(3)?),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(grants)
}

fn select_document_grants(conn: &Connection, doc: DocumentId) -> Result<Vec<DocumentGrant>> {
    let mut stmt = conn.prepare(
        "SELECT group_name, can_view, can_download FROM document_permissions
         WHERE document_id = ?1 ORDER BY group_name",
    )?;
    let grants = stmt
        .query_map(params![doc.0], |row| {
            Ok(DocumentGrant::new(
                row.get::<_, String>(0)?,
                DocumentFlags::new(row.get(1)?, row.get(2)?),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(grants)
}

fn require_document(conn: &Connection, id: DocumentId) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
        params![id.0],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::not_found("document", id))
    }
}

fn upsert_folder_row(conn: &Connection, folder: FolderId, grant: &FolderGrant) -> Result<()> {
    conn.execute(
        "INSERT INTO folder_permissions (folder_id, group_name, can_read, can_write, can_delete)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (folder_id, group_name)
         DO UPDATE SET can_read = ?3, can_write = ?4, can_delete = ?5",
        params![
            folder.0,
            grant.group,
            grant.flags.can_read,
            grant.flags.can_write,
            grant.flags.can_delete,
        ],
    )?;
    Ok(())
}

fn upsert_document_row(conn: &Connection, doc: DocumentId, grant: &DocumentGrant) -> Result<()> {
    conn.execute(
        "INSERT INTO document_permissions (document_id, group_name, can_view, can_download)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (document_id, group_name)
         DO UPDATE SET can_view = ?3, can_download = ?4",
        params![doc.0, grant.group, grant.flags.can_view, grant.flags.can_download],
    )?;
    Ok(())
}

fn collect_credentials(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Credential>> {
    let mut stmt = conn.prepare(sql)?;
    let creds = stmt
        .query_map(params, row_to_credential)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(creds)
}

#[async_trait]
impl Store for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Group Registry
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let group = group.clone();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if group_exists(&tx, &group.name)? {
                return Err(StoreError::duplicate("group", group.name));
            }

            let now = now_millis();
            tx.execute(
                "INSERT INTO groups (name, description, created_at) VALUES (?1, ?2, ?3)",
                params![group.name, group.description, now],
            )?;
            let id = GroupId(tx.last_insert_rowid());
            tx.commit()?;

            Ok(Group {
                id,
                name: group.name,
                description: group.description,
                created_at: now,
            })
        })
        .await
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        self.read(move |conn| query_group(conn, id)).await
    }

    async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let name = name.to_string();

        self.read(move |conn| {
            conn.query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE name = ?1"),
                params![name],
                row_to_group,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn update_group(&self, id: GroupId, update: &GroupUpdate) -> Result<Group> {
        let update = update.clone();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current = query_group(&tx, id)?.ok_or_else(|| StoreError::not_found("group", id))?;
            let name = update.name.unwrap_or_else(|| current.name.clone());
            let description = update
                .description
                .unwrap_or_else(|| current.description.clone());

            if name != current.name {
                if group_exists(&tx, &name)? {
                    return Err(StoreError::duplicate("group", name));
                }

                let users = tx.execute(
                    "UPDATE users SET group_name = ?1 WHERE group_name = ?2",
                    params![name, current.name],
                )?;
                let folder_rows = tx.execute(
                    "UPDATE folder_permissions SET group_name = ?1 WHERE group_name = ?2",
                    params![name, current.name],
                )?;
                let document_rows = tx.execute(
                    "UPDATE document_permissions SET group_name = ?1 WHERE group_name = ?2",
                    params![name, current.name],
                )?;
                debug!(
                    from = %current.name,
                    to = %name,
                    users,
                    folder_rows,
                    document_rows,
                    "group references rewritten"
                );
            }

            tx.execute(
                "UPDATE groups SET name = ?1, description = ?2 WHERE id = ?3",
                params![name, description, id.0],
            )?;
            tx.commit()?;

            Ok(Group {
                id,
                name,
                description,
                created_at: current.created_at,
            })
        })
        .await
    }

    async fn delete_group(&self, id: GroupId) -> Result<Group> {
        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let group = query_group(&tx, id)?.ok_or_else(|| StoreError::not_found("group", id))?;

            let users = count_members(&tx, &group.name)?;
            if users > 0 {
                return Err(StoreError::GroupInUse {
                    name: group.name,
                    users,
                });
            }

            let folder_rows = tx.execute(
                "DELETE FROM folder_permissions WHERE group_name = ?1",
                params![group.name],
            )?;
            let document_rows = tx.execute(
                "DELETE FROM document_permissions WHERE group_name = ?1",
                params![group.name],
            )?;
            tx.execute("DELETE FROM groups WHERE id = ?1", params![id.0])?;
            tx.commit()?;

            debug!(group = %group.name, folder_rows, document_rows, "group permissions purged");
            Ok(group)
        })
        .await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {GROUP_COLUMNS} FROM groups ORDER BY name"))?;
            let groups = stmt
                .query_map([], row_to_group)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(groups)
        })
        .await
    }

    async fn count_group_members(&self, name: &str) -> Result<u64> {
        let name = name.to_string();
        self.read(move |conn| count_members(conn, &name)).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let user = user.clone();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !group_exists(&tx, &user.group)? {
                return Err(StoreError::GroupNotFound(user.group));
            }

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![user.email],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::duplicate("user", user.email));
            }

            let now = now_millis();
            tx.execute(
                "INSERT INTO users (email, role, group_name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.email, user.role.as_str(), user.group, now],
            )?;
            let id = UserId(tx.last_insert_rowid());
            tx.commit()?;

            Ok(User {
                id,
                email: user.email,
                role: user.role,
                group: user.group,
                created_at: now,
            })
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.read(move |conn| query_user(conn, id)).await
    }

    async fn set_user_group(&self, id: UserId, group: &str) -> Result<User> {
        let group = group.to_string();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut user = query_user(&tx, id)?.ok_or_else(|| StoreError::not_found("user", id))?;
            if !group_exists(&tx, &group)? {
                return Err(StoreError::GroupNotFound(group));
            }

            tx.execute(
                "UPDATE users SET group_name = ?1 WHERE id = ?2",
                params![group, id.0],
            )?;
            tx.commit()?;

            user.group = group;
            Ok(user)
        })
        .await
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.write(move |conn| {
            let removed = conn.execute("DELETE FROM users WHERE id = ?1", params![id.0])?;
            if removed == 0 {
                return Err(StoreError::not_found("user", id));
            }
            Ok(())
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY email"))?;
            let users = stmt
                .query_map([], row_to_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Folders
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_folder(&self, folder: &NewFolder) -> Result<Folder> {
        let folder = folder.clone();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM folders WHERE name = ?1)",
                params![folder.name],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::duplicate("folder", folder.name));
            }

            let now = now_millis();
            tx.execute(
                "INSERT INTO folders (name, description, created_at) VALUES (?1, ?2, ?3)",
                params![folder.name, folder.description, now],
            )?;
            let id = FolderId(tx.last_insert_rowid());
            tx.commit()?;

            Ok(Folder {
                id,
                name: folder.name,
                description: folder.description,
                created_at: now,
            })
        })
        .await
    }

    async fn get_folder(&self, id: FolderId) -> Result<Option<Folder>> {
        self.read(move |conn| {
            conn.query_row(
                &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?1"),
                params![id.0],
                row_to_folder,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {FOLDER_COLUMNS} FROM folders ORDER BY name"))?;
            let folders = stmt
                .query_map([], row_to_folder)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(folders)
        })
        .await
    }

    async fn delete_folder(&self, id: FolderId) -> Result<()> {
        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_folder(&tx, id)?;

            let credentials =
                tx.execute("DELETE FROM credentials WHERE folder_id = ?1", params![id.0])?;
            let permissions = tx.execute(
                "DELETE FROM folder_permissions WHERE folder_id = ?1",
                params![id.0],
            )?;
            tx.execute("DELETE FROM folders WHERE id = ?1", params![id.0])?;
            tx.commit()?;

            debug!(folder = %id, credentials, permissions, "folder removed");
            Ok(())
        })
        .await
    }

    async fn folder_permission(
        &self,
        folder: FolderId,
        group: &str,
    ) -> Result<Option<FolderFlags>> {
        let group = group.to_string();

        self.read(move |conn| {
            conn.query_row(
                "SELECT can_read, can_write, can_delete FROM folder_permissions
                 WHERE folder_id = ?1 AND group_name = ?2",
                params![folder.0, group],
                |row| Ok(FolderFlags::new(row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn folder_permissions(&self, folder: FolderId) -> Result<Vec<FolderGrant>> {
        self.read(move |conn| {
            require_folder(conn, folder)?;
            select_folder_grants(conn, folder)
        })
        .await
    }

    async fn folder_matrix_rows(&self, folder: FolderId) -> Result<MatrixRows<FolderGrant>> {
        self.read(move |conn| {
            // One read transaction pins a single snapshot for both queries.
            let tx = conn.unchecked_transaction()?;
            require_folder(&tx, folder)?;
            let rows = MatrixRows {
                groups: select_group_names(&tx)?,
                stored: select_folder_grants(&tx, folder)?,
            };
            tx.commit()?;
            Ok(rows)
        })
        .await
    }

    async fn replace_folder_permissions(
        &self,
        folder: FolderId,
        grants: &[FolderGrant],
    ) -> Result<()> {
        let grants = grants.to_vec();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_folder(&tx, folder)?;

            for grant in &grants {
                if !group_exists(&tx, &grant.group)? {
                    // Dropping `tx` rolls back rows written earlier in the loop.
                    return Err(StoreError::GroupNotFound(grant.group.clone()));
                }
                upsert_folder_row(&tx, folder, grant)?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_document(
        &self,
        doc: &NewDocument,
        defaults: &[DocumentGrant],
    ) -> Result<Document> {
        let size = i64::try_from(doc.size)
            .map_err(|_| StoreError::InvalidData(format!("document size {} out of range", doc.size)))?;
        let doc = doc.clone();
        let defaults = defaults.to_vec();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let now = now_millis();
            tx.execute(
                "INSERT INTO documents (
                    filename, original_filename, size, mime_type, uploaded_by, description, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    doc.filename,
                    doc.original_filename,
                    size,
                    doc.mime_type,
                    doc.uploaded_by.0,
                    doc.description,
                    now,
                ],
            )?;
            let id = DocumentId(tx.last_insert_rowid());

            for grant in &defaults {
                if group_exists(&tx, &grant.group)? {
                    upsert_document_row(&tx, id, grant)?;
                } else {
                    warn!(group = %grant.group, document = %id, "skipping default grant for unknown group");
                }
            }

            tx.commit()?;

            Ok(Document {
                id,
                filename: doc.filename,
                original_filename: doc.original_filename,
                size: doc.size,
                mime_type: doc.mime_type,
                uploaded_by: doc.uploaded_by,
                description: doc.description,
                created_at: now,
            })
        })
        .await
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        self.read(move |conn| {
            conn.query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id.0],
                row_to_document,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, id DESC"
            ))?;
            let docs = stmt
                .query_map([], row_to_document)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(docs)
        })
        .await
    }

    async fn delete_document(&self, id: DocumentId) -> Result<()> {
        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_document(&tx, id)?;

            let permissions = tx.execute(
                "DELETE FROM document_permissions WHERE document_id = ?1",
                params![id.0],
            )?;
            tx.execute("DELETE FROM documents WHERE id = ?1", params![id.0])?;
            tx.commit()?;

            debug!(document = %id, permissions, "document removed");
            Ok(())
        })
        .await
    }

    async fn document_permission(
        &self,
        doc: DocumentId,
        group: &str,
    ) -> Result<Option<DocumentFlags>> {
        let group = group.to_string();

        self.read(move |conn| {
            conn.query_row(
                "SELECT can_view, can_download FROM document_permissions
                 WHERE document_id = ?1 AND group_name = ?2",
                params![doc.0, group],
                |row| Ok(DocumentFlags::new(row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn document_permissions(&self, doc: DocumentId) -> Result<Vec<DocumentGrant>> {
        self.read(move |conn| {
            require_document(conn, doc)?;
            select_document_grants(conn, doc)
        })
        .await
    }

    async fn document_matrix_rows(&self, doc: DocumentId) -> Result<MatrixRows<DocumentGrant>> {
        self.read(move |conn| {
            let tx = conn.unchecked_transaction()?;
            require_document(&tx, doc)?;
            let rows = MatrixRows {
                groups: select_group_names(&tx)?,
                stored: select_document_grants(&tx, doc)?,
            };
            tx.commit()?;
            Ok(rows)
        })
        .await
    }

    async fn replace_document_permissions(
        &self,
        doc: DocumentId,
        grants: &[DocumentGrant],
    ) -> Result<()> {
        let grants = grants.to_vec();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_document(&tx, doc)?;

            for grant in &grants {
                if !group_exists(&tx, &grant.group)? {
                    return Err(StoreError::GroupNotFound(grant.group.clone()));
                }
                upsert_document_row(&tx, doc, grant)?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_credential(
        &self,
        cred: &NewCredential,
        created_by: UserId,
    ) -> Result<Credential> {
        let cred = cred.clone();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_folder(&tx, cred.folder_id)?;

            let now = now_millis();
            tx.execute(
                "INSERT INTO credentials (
                    folder_id, service_name, username, password, notes, created_by, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    cred.folder_id.0,
                    cred.service_name,
                    cred.username,
                    cred.password.expose(),
                    cred.notes,
                    created_by.0,
                    now,
                ],
            )?;
            let id = CredentialId(tx.last_insert_rowid());
            tx.commit()?;

            Ok(Credential {
                id,
                folder_id: cred.folder_id,
                service_name: cred.service_name,
                username: cred.username,
                password: cred.password,
                notes: cred.notes,
                created_by,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>> {
        self.read(move |conn| query_credential(conn, id)).await
    }

    async fn update_credential(
        &self,
        id: CredentialId,
        update: &CredentialUpdate,
    ) -> Result<Credential> {
        let update = update.clone();

        self.write(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut cred =
                query_credential(&tx, id)?.ok_or_else(|| StoreError::not_found("credential", id))?;

            if let Some(folder_id) = update.folder_id {
                require_folder(&tx, folder_id)?;
                cred.folder_id = folder_id;
            }
            if let Some(service_name) = update.service_name {
                cred.service_name = service_name;
            }
            if let Some(username) = update.username {
                cred.username = username;
            }
            if let Some(password) = update.password {
                cred.password = password;
            }
            if let Some(notes) = update.notes {
                cred.notes = notes;
            }
            cred.updated_at = now_millis();

            tx.execute(
                "UPDATE credentials SET folder_id = ?1, service_name = ?2, username = ?3,
                    password = ?4, notes = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    cred.folder_id.0,
                    cred.service_name,
                    cred.username,
                    cred.password.expose(),
                    cred.notes,
                    cred.updated_at,
                    id.0,
                ],
            )?;
            tx.commit()?;

            Ok(cred)
        })
        .await
    }

    async fn delete_credential(&self, id: CredentialId) -> Result<()> {
        self.write(move |conn| {
            let removed = conn.execute("DELETE FROM credentials WHERE id = ?1", params![id.0])?;
            if removed == 0 {
                return Err(StoreError::not_found("credential", id));
            }
            Ok(())
        })
        .await
    }

    async fn credentials_in_folder(&self, folder: FolderId) -> Result<Vec<Credential>> {
        self.read(move |conn| {
            require_folder(conn, folder)?;
            collect_credentials(
                conn,
                &format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE folder_id = ?1
                     ORDER BY created_at DESC, id DESC"
                ),
                params![folder.0],
            )
        })
        .await
    }

    async fn credentials_readable_by(&self, group: &str) -> Result<Vec<Credential>> {
        let group = group.to_string();

        self.read(move |conn| {
            collect_credentials(
                conn,
                "SELECT c.id, c.folder_id, c.service_name, c.username, c.password, c.notes,
                        c.created_by, c.created_at, c.updated_at
                 FROM credentials c
                 JOIN folder_permissions fp ON fp.folder_id = c.folder_id
                 WHERE fp.group_name = ?1 AND fp.can_read = 1
                 ORDER BY c.created_at DESC, c.id DESC",
                params![group],
            )
        })
        .await
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>> {
        self.read(|conn| {
            collect_credentials(
                conn,
                &format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM credentials ORDER BY created_at DESC, id DESC"
                ),
                [],
            )
        })
        .await
    }
}
