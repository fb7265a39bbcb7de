// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StoreError;

/// Authentication error type.
///
/// None of these are retried internally. Authentication failures map to
/// 401, authorization failures to 403, each with a stable `error_code`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Authorization header is required")]
    MissingAuthHeader,
    /// Invalid authorization header format
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// No authenticated session attached to the request
    #[error("Authentication required")]
    Unauthenticated,
    /// Signature, structure or expiry check failed
    #[error("Token is invalid or expired")]
    InvalidToken,
    /// Session expired or was revoked
    #[error("Session not found")]
    SessionNotFound,
    /// Refresh token unknown, already rotated, or its session is gone
    #[error("Refresh token is invalid or expired")]
    InvalidRefreshToken,
    /// Username/password mismatch
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// Authenticated but lacking the required permission
    #[error("Insufficient permissions for this operation")]
    PermissionDenied,
    /// The enforcer was built without an RBAC backend
    #[error("Permission service is not configured")]
    PermissionServiceUnavailable,
    /// Store I/O failure, surfaced verbatim
    #[error("Session store error: {0}")]
    Storage(#[from] StoreError),
    /// Internal error
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::InvalidToken => "invalid_token",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::PermissionDenied => "permission_denied",
            AuthError::PermissionServiceUnavailable => "permission_service_unavailable",
            AuthError::Storage(_) => "storage_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Unauthenticated
            | AuthError::InvalidToken
            | AuthError::SessionNotFound
            | AuthError::InvalidRefreshToken
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::PermissionDenied => StatusCode::FORBIDDEN,
            AuthError::PermissionServiceUnavailable
            | AuthError::Storage(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, error_code = self.error_code(), "Auth failure");
        }
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn permission_denied_returns_403() {
        let response = AuthError::PermissionDenied.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn session_errors_are_unauthenticated() {
        for err in [
            AuthError::InvalidToken,
            AuthError::SessionNotFound,
            AuthError::InvalidRefreshToken,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn unconfigured_permission_service_is_server_error() {
        let err = AuthError::PermissionServiceUnavailable;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "permission_service_unavailable");
    }
}
