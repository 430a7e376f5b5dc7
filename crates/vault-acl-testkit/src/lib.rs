//! # Vault ACL Testkit
//!
//! Testing utilities for the vault access-control engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A vault seeded with groups, actors and folders
//! - **Generators**: Proptest strategies for flags, actors and batches
//!
//! The cross-store property suite and the concurrency checks live in this
//! crate's `tests/` directory, and the evaluator benchmark in `benches/`.
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vault_acl_testkit::generators::{folder_batch, folder_op};
//!
//! proptest! {
//!     #[test]
//!     fn batch_is_applied(batch in folder_batch(), op in folder_op()) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use vault_acl_testkit::fixtures::VaultFixture;
//!
//! async fn example() {
//!     let f = VaultFixture::memory().await.unwrap();
//!     let matrix = f.vault.folder_matrix(f.prod).await.unwrap();
//!     assert_eq!(matrix.cells.len(), 3);
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{sample_credential, VaultFixture, FIXTURE_GROUPS};
pub use generators::{document_batch, folder_batch, PoisonedBatch};
