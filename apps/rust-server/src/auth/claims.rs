// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token claims and the per-request session context.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::is_admin_role;

/// Claims carried by an access token.
///
/// The token is verified by signature and expiry only. `sid` is the join key
/// back to the session store, which is what makes revocation possible before
/// the token expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Session ID
    pub sid: String,
    /// Subject (user ID)
    pub sub: String,
    /// Role snapshot taken at login
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Authenticated session attached to a request after validation.
///
/// This is the primary type used by handlers and the permission gate to
/// represent who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionContext {
    /// Server-side session ID
    pub session_id: String,
    /// Canonical user ID
    pub user_id: String,
    /// Roles carried by the session
    pub roles: Vec<String>,
}

impl SessionContext {
    /// Whether any of the session's roles is the admin role.
    pub fn is_admin(&self, admin_role: &str) -> bool {
        self.roles.iter().any(|role| is_admin_role(role, admin_role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(roles: &[&str]) -> SessionContext {
        SessionContext {
            session_id: "sess_abc".to_string(),
            user_id: "user_123".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn admin_detection_is_case_insensitive() {
        assert!(context(&["USER", "admin"]).is_admin("ADMIN"));
        assert!(context(&[" Admin "]).is_admin("ADMIN"));
        assert!(!context(&["USER"]).is_admin("ADMIN"));
        assert!(!context(&[]).is_admin("ADMIN"));
    }

    #[test]
    fn claims_use_compact_field_names() {
        let claims = AccessClaims {
            sid: "s".to_string(),
            sub: "u".to_string(),
            roles: vec!["USER".to_string()],
            iss: "warden".to_string(),
            aud: "warden-api".to_string(),
            iat: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();
        for field in ["sid", "sub", "roles", "iss", "aud", "iat", "exp"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
