// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Embedded Storage
//!
//! All persistent state lives in a single redb database file (pure Rust,
//! ACID). Every multi-key mutation runs inside one write transaction; redb
//! serializes writers, so a committed transaction is both atomic and
//! isolated from concurrent writers.
//!
//! ## Table Layout
//!
//! ```text
//! kv                  key → [expires_at_ms | payload]   (sessions, refresh index)
//! users               user_id → StoredUser (JSON)
//! usernames           username → user_id
//! roles               role_id → Role (JSON)
//! role_names          NAME → role_id
//! permissions         permission_id → Permission (JSON)
//! permission_keys     resource:action → permission_id
//! role_permissions    role_id ⇉ permission_id   (multimap)
//! user_roles          user_id ⇉ role_id         (multimap)
//! ```

use std::path::Path;
use std::sync::Arc;

use redb::Database;

pub mod kv;
pub mod repository;

pub use kv::{KvBatch, TtlStore};
pub use repository::{StoredUser, UserRepository};

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A compare-and-set expectation did not hold; nothing was written.
    #[error("precondition failed for key {0}")]
    PreconditionFailed(String),

    #[error("credential hashing error: {0}")]
    Credential(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Database Bootstrap
// =============================================================================

/// Open (or create) the database at the given path and pre-create every table
/// so later read transactions never fail with `TableDoesNotExist`.
pub fn open_database(path: &Path) -> StoreResult<Arc<Database>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::create(path)?;

    let write_txn = db.begin_write()?;
    {
        kv::create_tables(&write_txn)?;
        repository::users::create_tables(&write_txn)?;
        crate::rbac::store::create_tables(&write_txn)?;
    }
    write_txn.commit()?;

    tracing::info!(path = %path.display(), "Opened redb database");
    Ok(Arc::new(db))
}

/// Current wall-clock time in unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh database in a throwaway directory. Keep the `TempDir` alive for
    /// the duration of the test.
    pub fn temp_database() -> (Arc<Database>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = open_database(&dir.path().join("test.redb")).expect("open database");
        (db, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_database_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("warden.redb");
        let db = open_database(&path).unwrap();
        assert!(path.exists());
        drop(db);

        // Re-opening an existing file keeps working.
        open_database(&path).unwrap();
    }
}
