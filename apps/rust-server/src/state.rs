// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use redb::Database;

use crate::auth::{AuthError, AuthService, KvSessionStore, TokenCodec};
use crate::config::AppConfig;
use crate::rbac::{Enforcer, RbacStore};
use crate::storage::{TtlStore, UserRepository};

/// Services shared by every handler. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rbac: Arc<RbacStore>,
    pub users: UserRepository,
    pub enforcer: Enforcer,
    pub db: Arc<Database>,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        rbac: Arc<RbacStore>,
        users: UserRepository,
        db: Arc<Database>,
    ) -> Self {
        let enforcer = Enforcer::new(rbac.clone(), rbac.admin_role());
        Self {
            auth,
            rbac,
            users,
            enforcer,
            db,
        }
    }

    /// Wire every service from configuration and an open database.
    pub fn from_config(config: &AppConfig, db: Arc<Database>) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(config.token_settings())?;
        let sessions = Arc::new(KvSessionStore::new(TtlStore::new(db.clone())));
        let auth = Arc::new(AuthService::new(codec, sessions, config.refresh_token_ttl));
        let rbac = Arc::new(RbacStore::new(db.clone(), &config.admin_role));
        let users = UserRepository::new(db.clone());
        Ok(Self::new(auth, rbac, users, db))
    }

    /// Name of the role that bypasses permission checks.
    pub fn admin_role(&self) -> &str {
        self.rbac.admin_role()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::auth::token::tests::test_codec;
    use crate::storage::test_support::temp_database;

    /// Fully wired state over a throwaway database.
    pub fn test_state() -> (AppState, tempfile::TempDir) {
        let (db, dir) = temp_database();
        let sessions = Arc::new(KvSessionStore::new(TtlStore::new(db.clone())));
        let auth = Arc::new(AuthService::new(
            test_codec(),
            sessions,
            Duration::from_secs(3600),
        ));
        let rbac = Arc::new(RbacStore::new(db.clone(), "ADMIN"));
        let users = UserRepository::new(db.clone());
        (AppState::new(auth, rbac, users, db), dir)
    }
}
