//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL batch
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use vault_acl_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::info!(from = current, to = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Group names are weak references from users and permission rows; the store
/// keeps them consistent on rename and delete. Folders and documents own
/// their permission rows and credentials via `ON DELETE CASCADE`.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        );

        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL CHECK (role IN ('admin', 'user')),
            group_name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE folders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        );

        -- At most one row per (folder, group): upserts hit the primary key
        CREATE TABLE folder_permissions (
            folder_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
            group_name TEXT NOT NULL,
            can_read INTEGER NOT NULL DEFAULT 0,
            can_write INTEGER NOT NULL DEFAULT 0,
            can_delete INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (folder_id, group_name)
        );

        CREATE TABLE credentials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
            service_name TEXT NOT NULL,
            username TEXT NOT NULL,
            password BLOB NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_by INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            size INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            uploaded_by INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        );

        CREATE TABLE document_permissions (
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            group_name TEXT NOT NULL,
            can_view INTEGER NOT NULL DEFAULT 0,
            can_download INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (document_id, group_name)
        );

        CREATE INDEX idx_users_group ON users(group_name);
        CREATE INDEX idx_folder_permissions_group ON folder_permissions(group_name);
        CREATE INDEX idx_document_permissions_group ON document_permissions(group_name);
        CREATE INDEX idx_credentials_folder ON credentials(folder_id);
        CREATE INDEX idx_documents_created ON documents(created_at);
        "#,
    )?;

    Ok(())
}
