// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server-side session records.
//!
//! ## Key Layout
//!
//! ```text
//! session:<sessionId>    → {"userId", "roles", "refreshToken"}   (JSON)
//! refresh:<refreshToken> → <sessionId>                           (plain string)
//! ```
//!
//! Both entries of a session are written with the same TTL (the refresh
//! token lifetime). Every write that touches both keys is one atomic batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::storage::{KvBatch, StoreError, TtlStore};

const SESSION_PREFIX: &str = "session:";
const REFRESH_PREFIX: &str = "refresh:";

fn session_key(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

fn refresh_key(refresh_token: &str) -> String {
    format!("{REFRESH_PREFIX}{refresh_token}")
}

/// One authenticated login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub roles: Vec<String>,
    pub refresh_token: String,
}

/// Value stored under `session:<id>`. The id is the key, not part of the body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    user_id: String,
    #[serde(default)]
    roles: Vec<String>,
    refresh_token: String,
}

impl SessionRecord {
    fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            roles: session.roles.clone(),
            refresh_token: session.refresh_token.clone(),
        }
    }

    fn into_session(self, session_id: String) -> Session {
        Session {
            session_id,
            user_id: self.user_id,
            roles: self.roles,
            refresh_token: self.refresh_token,
        }
    }
}

/// Durable TTL mapping of sessions and their refresh-token index.
///
/// All operations take the refresh-token lifetime as TTL. Store I/O failures
/// surface as `AuthError::Storage`; nothing is retried here.
pub trait SessionStore: Send + Sync {
    /// Atomically write the session record and its refresh index entry.
    fn save(&self, session: &Session, ttl: Duration) -> Result<(), AuthError>;

    /// Load a session by ID, or `SessionNotFound`.
    fn get(&self, session_id: &str) -> Result<Session, AuthError>;

    /// Resolve a refresh token to its live session, or `InvalidRefreshToken`.
    fn get_by_refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError>;

    /// Atomically rewrite the session with its new refresh token, install the
    /// new index entry and delete the `previous` one.
    fn replace_refresh_token(
        &self,
        session: &Session,
        previous: &str,
        ttl: Duration,
    ) -> Result<(), AuthError>;

    /// Delete a session and its refresh index entry. Returns whether a live
    /// session existed.
    fn delete(&self, session_id: &str) -> Result<bool, AuthError>;
}

/// `SessionStore` over the redb-backed TTL key-value table.
#[derive(Clone)]
pub struct KvSessionStore {
    kv: TtlStore,
}

impl KvSessionStore {
    pub fn new(kv: TtlStore) -> Self {
        Self { kv }
    }

    fn load(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        match self.kv.get(&session_key(session_id))? {
            Some(bytes) => {
                let record: SessionRecord =
                    serde_json::from_slice(&bytes).map_err(StoreError::from)?;
                Ok(Some(record.into_session(session_id.to_string())))
            }
            None => Ok(None),
        }
    }
}

impl SessionStore for KvSessionStore {
    fn save(&self, session: &Session, ttl: Duration) -> Result<(), AuthError> {
        let record =
            serde_json::to_vec(&SessionRecord::from_session(session)).map_err(StoreError::from)?;

        let batch = KvBatch::new()
            .set(session_key(&session.session_id), record, ttl)
            .set(
                refresh_key(&session.refresh_token),
                session.session_id.as_bytes(),
                ttl,
            );
        self.kv.commit(batch)?;
        Ok(())
    }

    fn get(&self, session_id: &str) -> Result<Session, AuthError> {
        self.load(session_id)?.ok_or(AuthError::SessionNotFound)
    }

    fn get_by_refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let session_id = match self.kv.get(&refresh_key(refresh_token))? {
            Some(bytes) => String::from_utf8(bytes).map_err(|_| AuthError::InvalidRefreshToken)?,
            None => return Err(AuthError::InvalidRefreshToken),
        };

        // The refresh token is the credential under scrutiny here: a dangling
        // index entry is reported as an invalid refresh token, never as a
        // missing session.
        match self.load(&session_id)? {
            Some(session) if session.refresh_token == refresh_token => Ok(session),
            _ => Err(AuthError::InvalidRefreshToken),
        }
    }

    fn replace_refresh_token(
        &self,
        session: &Session,
        previous: &str,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let record =
            serde_json::to_vec(&SessionRecord::from_session(session)).map_err(StoreError::from)?;

        // The previous index entry must still point at this session. Of two
        // concurrent rotations of the same token only the first commit
        // passes this check.
        let batch = KvBatch::new()
            .expect(refresh_key(previous), session.session_id.as_bytes())
            .set(session_key(&session.session_id), record, ttl)
            .set(
                refresh_key(&session.refresh_token),
                session.session_id.as_bytes(),
                ttl,
            )
            .delete(refresh_key(previous));

        match self.kv.commit(batch) {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed(_)) => Err(AuthError::InvalidRefreshToken),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, session_id: &str) -> Result<bool, AuthError> {
        let Some(session) = self.load(session_id)? else {
            return Ok(false);
        };

        let batch = KvBatch::new()
            .delete(session_key(session_id))
            .delete(refresh_key(&session.refresh_token));
        self.kv.commit(batch)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_database;

    const TTL: Duration = Duration::from_secs(3600);

    fn store() -> (KvSessionStore, TtlStore, tempfile::TempDir) {
        let (db, dir) = temp_database();
        let kv = TtlStore::new(db);
        (KvSessionStore::new(kv.clone()), kv, dir)
    }

    fn session(id: &str, refresh: &str) -> Session {
        Session {
            session_id: id.to_string(),
            user_id: "U1".to_string(),
            roles: vec!["USER".to_string()],
            refresh_token: refresh.to_string(),
        }
    }

    #[test]
    fn save_writes_both_keys() {
        let (sessions, kv, _dir) = store();
        sessions.save(&session("s1", "r1"), TTL).unwrap();

        assert_eq!(sessions.get("s1").unwrap(), session("s1", "r1"));
        assert_eq!(kv.get("refresh:r1").unwrap(), Some(b"s1".to_vec()));

        let raw = kv.get("session:s1").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["userId"], "U1");
        assert_eq!(json["roles"][0], "USER");
        assert_eq!(json["refreshToken"], "r1");
    }

    #[test]
    fn get_missing_session_is_session_not_found() {
        let (sessions, _kv, _dir) = store();
        assert!(matches!(sessions.get("nope"), Err(AuthError::SessionNotFound)));
    }

    #[test]
    fn unknown_refresh_token_is_invalid() {
        let (sessions, _kv, _dir) = store();
        assert!(matches!(
            sessions.get_by_refresh_token("unknown"),
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn dangling_refresh_index_is_invalid_refresh_token() {
        let (sessions, kv, _dir) = store();
        kv.set("refresh:r-orphan", b"ghost-session", TTL).unwrap();

        assert!(matches!(
            sessions.get_by_refresh_token("r-orphan"),
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn expired_session_is_gone() {
        let (sessions, _kv, _dir) = store();
        sessions.save(&session("s1", "r1"), Duration::ZERO).unwrap();

        assert!(matches!(sessions.get("s1"), Err(AuthError::SessionNotFound)));
        assert!(matches!(
            sessions.get_by_refresh_token("r1"),
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn replace_refresh_token_rotates_index() {
        let (sessions, kv, _dir) = store();
        sessions.save(&session("s1", "r1"), TTL).unwrap();

        sessions
            .replace_refresh_token(&session("s1", "r2"), "r1", TTL)
            .unwrap();

        assert_eq!(sessions.get_by_refresh_token("r2").unwrap().session_id, "s1");
        assert!(matches!(
            sessions.get_by_refresh_token("r1"),
            Err(AuthError::InvalidRefreshToken)
        ));
        assert_eq!(kv.get("refresh:r1").unwrap(), None);
        assert_eq!(sessions.get("s1").unwrap().refresh_token, "r2");
    }

    #[test]
    fn stale_rotation_writes_nothing() {
        let (sessions, kv, _dir) = store();
        sessions.save(&session("s1", "r1"), TTL).unwrap();
        sessions
            .replace_refresh_token(&session("s1", "r2"), "r1", TTL)
            .unwrap();

        // A second rotation that raced on r1 loses.
        let result = sessions.replace_refresh_token(&session("s1", "r3"), "r1", TTL);
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));

        assert_eq!(kv.get("refresh:r3").unwrap(), None);
        assert_eq!(sessions.get("s1").unwrap().refresh_token, "r2");
    }

    #[test]
    fn delete_removes_session_and_index() {
        let (sessions, kv, _dir) = store();
        sessions.save(&session("s1", "r1"), TTL).unwrap();

        assert!(sessions.delete("s1").unwrap());
        assert!(!sessions.delete("s1").unwrap());
        assert!(matches!(sessions.get("s1"), Err(AuthError::SessionNotFound)));
        assert_eq!(kv.get("refresh:r1").unwrap(), None);
    }
}
