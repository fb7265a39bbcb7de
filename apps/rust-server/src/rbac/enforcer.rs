// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-route permission gates.
//!
//! ```rust,ignore
//! let gate = state.enforcer.require("role:list");
//! let route = get(list_roles).route_layer(from_fn_with_state(gate, enforce));
//! ```
//!
//! The gate runs after `auth::middleware::authenticate` and expects a
//! `SessionContext` in the request extensions.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::RbacError;
use crate::auth::{AuthError, SessionContext};

/// The single query the enforcer needs from the RBAC backend.
pub trait PermissionChecker: Send + Sync {
    fn has_permission(&self, user_id: &str, key: &str) -> Result<bool, RbacError>;
}

/// Builds permission gates. Cheap to clone.
#[derive(Clone)]
pub struct Enforcer {
    checker: Option<Arc<dyn PermissionChecker>>,
    admin_role: Arc<str>,
}

impl std::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enforcer")
            .field("wired", &self.checker.is_some())
            .field("admin_role", &self.admin_role)
            .finish()
    }
}

impl Enforcer {
    pub fn new(checker: Arc<dyn PermissionChecker>, admin_role: &str) -> Self {
        Self {
            checker: Some(checker),
            admin_role: Arc::from(admin_role),
        }
    }

    /// An enforcer with no RBAC backend. Every non-admin permission check
    /// fails with `PermissionServiceUnavailable`.
    pub fn detached(admin_role: &str) -> Self {
        Self {
            checker: None,
            admin_role: Arc::from(admin_role),
        }
    }

    /// Gate for one route. An empty key means "authenticated only".
    pub fn require(&self, permission: &str) -> PermissionGate {
        PermissionGate {
            enforcer: self.clone(),
            permission: Arc::from(permission.trim()),
        }
    }

    /// Decide whether `session` may use `permission`.
    pub fn authorize(
        &self,
        session: Option<&SessionContext>,
        permission: &str,
    ) -> Result<(), AuthError> {
        let Some(session) = session else {
            return Err(AuthError::Unauthenticated);
        };

        if permission.is_empty() {
            return Ok(());
        }

        if session.is_admin(&self.admin_role) {
            tracing::debug!(
                user_id = %session.user_id,
                permission = %permission,
                "Admin bypass"
            );
            return Ok(());
        }

        let Some(checker) = self.checker.as_ref() else {
            tracing::error!(permission = %permission, "Permission check without an RBAC backend");
            return Err(AuthError::PermissionServiceUnavailable);
        };

        match checker.has_permission(&session.user_id, permission) {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::info!(
                    user_id = %session.user_id,
                    session_id = %session.session_id,
                    permission = %permission,
                    "Permission denied"
                );
                Err(AuthError::PermissionDenied)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %session.user_id,
                    permission = %permission,
                    error = %e,
                    "Permission check failed, denying"
                );
                Err(AuthError::PermissionDenied)
            }
        }
    }
}

/// Middleware state for one guarded route.
#[derive(Clone, Debug)]
pub struct PermissionGate {
    enforcer: Enforcer,
    permission: Arc<str>,
}

impl PermissionGate {
    pub fn permission(&self) -> &str {
        &self.permission
    }
}

/// Permission middleware. Use with `axum::middleware::from_fn_with_state`.
pub async fn enforce(State(gate): State<PermissionGate>, request: Request, next: Next) -> Response {
    let session = request.extensions().get::<SessionContext>();
    match gate.enforcer.authorize(session, &gate.permission) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
