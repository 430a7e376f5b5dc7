//! # Vault ACL Store
//!
//! Storage abstraction for the vault access-control engine. Provides a
//! trait-based interface for groups, users, resources and permission
//! matrices with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait,
//! allowing the engine to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`SqliteOptions`] - Reader pool size and busy timeout
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vault_acl_core::{FolderFlags, FolderGrant, NewFolder, NewGroup};
//! use vault_acl_store::{SqliteStore, Store};
//!
//! async fn example() -> vault_acl_store::Result<()> {
//!     let store = SqliteStore::open("vault.db")?;
//!
//!     store.create_group(&NewGroup::new("senior", "")).await?;
//!     let folder = store.create_folder(&NewFolder::new("prod", "")).await?;
//!     store
//!         .replace_folder_permissions(folder.id, &[FolderGrant::new("senior", FolderFlags::ALL)])
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic batches**: `replace_*_permissions` applies every grant or none
//! - **Upsert**: at most one row per (resource, group); rewriting it is idempotent
//! - **Weak group references**: renames rewrite, deletes purge or are refused

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::{SqliteOptions, SqliteStore};
pub use traits::{MatrixRows, Store, StoreExt};
