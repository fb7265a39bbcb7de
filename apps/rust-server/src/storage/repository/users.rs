// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Users are login identities: a lowercase username and an argon2id password
//! hash. Role membership lives in the RBAC store, not here.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use super::super::{StoreError, StoreResult};

/// Primary table: user_id → serialized StoredUser (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: lowercase username → user_id.
const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

pub(crate) fn create_tables(txn: &WriteTransaction) -> Result<(), redb::TableError> {
    let _ = txn.open_table(USERS)?;
    let _ = txn.open_table(USERNAMES)?;
    Ok(())
}

/// User stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub id: String,
    /// Login name, stored lowercase
    pub username: String,
    /// Argon2id PHC string. Never returned by the API.
    pub password_hash: String,
    /// When the user was created
    pub created_at: DateTime<Utc>,
}

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Insert `user` and its username index entry. Fails if the name is taken.
fn insert_user(txn: &WriteTransaction, user: &StoredUser) -> StoreResult<()> {
    let mut names = txn.open_table(USERNAMES)?;
    if names.get(user.username.as_str())?.is_some() {
        return Err(StoreError::AlreadyExists(format!("User {}", user.username)));
    }
    names.insert(user.username.as_str(), user.id.as_str())?;

    let json = serde_json::to_vec(user)?;
    let mut users = txn.open_table(USERS)?;
    users.insert(user.id.as_str(), json.as_slice())?;
    Ok(())
}

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let mut salt_bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut salt_bytes)
        .map_err(|_| StoreError::Credential("system random source unavailable".to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| StoreError::Credential(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Credential(e.to_string()))
}

/// Verify a password against an argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Repository for user records.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    /// Create a new UserRepository.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new user with a freshly hashed password.
    pub fn create(&self, username: &str, password: &str) -> StoreResult<StoredUser> {
        self.create_with(username, password, |_, _| Ok::<_, StoreError>(()))
            .map(|(user, ())| user)
    }

    /// Create a user and run `link` in the same write transaction.
    ///
    /// If `link` fails the transaction is aborted and no user is written.
    pub fn create_with<T, E, F>(
        &self,
        username: &str,
        password: &str,
        link: F,
    ) -> Result<(StoredUser, T), E>
    where
        E: From<StoreError>,
        F: FnOnce(&WriteTransaction, &StoredUser) -> Result<T, E>,
    {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(StoreError::Credential("username must not be empty".to_string()).into());
        }

        let user = StoredUser {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };

        let write_txn = self.db.begin_write().map_err(StoreError::from)?;
        let linked = match insert_user(&write_txn, &user) {
            Ok(()) => link(&write_txn, &user),
            Err(e) => Err(e.into()),
        };

        match linked {
            Ok(value) => {
                write_txn.commit().map_err(StoreError::from)?;
                tracing::info!(user_id = %user.id, username = %user.username, "Created user");
                Ok((user, value))
            }
            Err(e) => {
                write_txn.abort().map_err(StoreError::from)?;
                Err(e)
            }
        }
    }

    /// Get a user by ID.
    pub fn get(&self, user_id: &str) -> StoreResult<StoredUser> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StoreError::NotFound(format!("User {user_id}"))),
        }
    }

    /// Look up a user by username (case-insensitive).
    pub fn find_by_username(&self, username: &str) -> StoreResult<Option<StoredUser>> {
        let username = normalize_username(username);
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(USERNAMES)?;
        let user_id = match names.get(username.as_str())? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List all users.
    pub fn list(&self) -> StoreResult<Vec<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let mut result = Vec::new();
        for entry in users.iter()? {
            let (_, value) = entry?;
            result.push(serde_json::from_slice::<StoredUser>(value.value())?);
        }
        result.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(result)
    }

    /// Verify a username/password pair.
    ///
    /// Returns `None` for an unknown user or a wrong password; callers must
    /// not distinguish the two in responses.
    pub fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<Option<StoredUser>> {
        Ok(self
            .find_by_username(username)?
            .filter(|user| verify_password(password, &user.password_hash)))
    }

    /// Create the user if the username is not taken yet.
    ///
    /// Returns the existing or newly created user.
    pub fn ensure(&self, username: &str, password: &str) -> StoreResult<StoredUser> {
        if let Some(user) = self.find_by_username(username)? {
            return Ok(user);
        }
        match self.create(username, password) {
            Err(StoreError::AlreadyExists(_)) => self
                .find_by_username(username)?
                .ok_or_else(|| StoreError::NotFound(format!("User {username}"))),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_database;

    #[test]
    fn create_and_get_user() {
        let (db, _dir) = temp_database();
        let repo = UserRepository::new(db);

        let user = repo.create("Alice", "correct horse").unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.password_hash.starts_with("$argon2"));

        let loaded = repo.get(&user.id).unwrap();
        assert_eq!(loaded, user);
    }

    #[test]
    fn duplicate_username_rejected() {
        let (db, _dir) = temp_database();
        let repo = UserRepository::new(db);

        repo.create("bob", "pw-one").unwrap();
        let result = repo.create("BOB", "pw-two");
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn failed_link_leaves_no_user_behind() {
        let (db, _dir) = temp_database();
        let repo = UserRepository::new(db);

        let result = repo.create_with("dave", "pw", |_, _| {
            Err::<(), _>(StoreError::NotFound("Role GHOST".to_string()))
        });
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(repo.find_by_username("dave").unwrap().is_none());
        assert!(repo.list().unwrap().is_empty());

        // The username is still free.
        repo.create("dave", "pw").unwrap();
    }

    #[test]
    fn verify_credentials_checks_password() {
        let (db, _dir) = temp_database();
        let repo = UserRepository::new(db);
        repo.create("carol", "s3cret").unwrap();

        assert!(repo.verify_credentials("Carol", "s3cret").unwrap().is_some());
        assert!(repo.verify_credentials("carol", "wrong").unwrap().is_none());
        assert!(repo.verify_credentials("nobody", "s3cret").unwrap().is_none());
    }

    #[test]
    fn ensure_is_idempotent() {
        let (db, _dir) = temp_database();
        let repo = UserRepository::new(db);

        let first = repo.ensure("root", "pw").unwrap();
        let second = repo.ensure("root", "other-pw").unwrap();
        assert_eq!(first.id, second.id);
        assert!(verify_password("pw", &second.password_hash));
    }

    #[test]
    fn get_missing_user_is_not_found() {
        let (db, _dir) = temp_database();
        let repo = UserRepository::new(db);
        assert!(matches!(repo.get("nope"), Err(StoreError::NotFound(_))));
    }
}
