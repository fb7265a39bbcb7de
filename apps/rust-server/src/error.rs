// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthError;
use crate::rbac::RbacError;
use crate::storage::StoreError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Stable machine-readable code
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    /// Server-side failure. The detail is logged, not returned.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        if e.status_code().is_server_error() {
            tracing::error!(error = %e, error_code = e.error_code(), "Auth failure");
            return Self::new(e.status_code(), e.error_code(), "Internal server error");
        }
        Self::new(e.status_code(), e.error_code(), e.to_string())
    }
}

impl From<RbacError> for ApiError {
    fn from(e: RbacError) -> Self {
        match e {
            RbacError::InvalidPermissionKey(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_permission_key", e.to_string())
            }
            RbacError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
            RbacError::NotFound(_) => Self::not_found(e.to_string()),
            RbacError::Conflict(_) => Self::conflict(e.to_string()),
            RbacError::NoPermissionsResolved => {
                Self::unprocessable("no_permissions_resolved", e.to_string())
            }
            RbacError::ProtectedRole(_) => Self::new(StatusCode::CONFLICT, "protected_role", e.to_string()),
            RbacError::Storage(inner) => inner.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::not_found(format!("{what} not found")),
            StoreError::AlreadyExists(what) => Self::conflict(format!("{what} already exists")),
            other => Self::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
