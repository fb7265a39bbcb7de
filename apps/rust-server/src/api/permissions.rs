// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission catalog endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ErrorBody},
    rbac::{Permission, PermissionKey},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePermissionRequest {
    /// Permission key, `resource:action`
    pub key: String,
    #[serde(default)]
    pub description: String,
}

#[utoipa::path(
    get,
    path = "/v1/permissions",
    tag = "Permissions",
    security(("bearer" = [])),
    responses((status = 200, body = [Permission]))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    Ok(Json(state.rbac.list_permissions()?))
}

#[utoipa::path(
    post,
    path = "/v1/permissions",
    request_body = CreatePermissionRequest,
    tag = "Permissions",
    security(("bearer" = [])),
    responses(
        (status = 201, body = Permission),
        (status = 400, description = "Malformed key", body = ErrorBody),
        (status = 409, description = "Permission exists", body = ErrorBody)
    )
)]
pub async fn create_permission(
    State(state): State<AppState>,
    Json(request): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), ApiError> {
    let key = PermissionKey::parse(&request.key)?;
    let permission = state.rbac.create_permission(&key, &request.description)?;
    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    get,
    path = "/v1/permissions/{permission_id}",
    params(("permission_id" = String, Path, description = "Permission ID")),
    tag = "Permissions",
    security(("bearer" = [])),
    responses((status = 200, body = Permission), (status = 404, body = ErrorBody))
)]
pub async fn get_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<String>,
) -> Result<Json<Permission>, ApiError> {
    Ok(Json(state.rbac.get_permission(&permission_id)?))
}

/// Delete a permission and revoke it from every role.
///
/// A permission still declared by a route is recreated at the next boot.
#[utoipa::path(
    delete,
    path = "/v1/permissions/{permission_id}",
    params(("permission_id" = String, Path, description = "Permission ID")),
    tag = "Permissions",
    security(("bearer" = [])),
    responses((status = 204), (status = 404, body = ErrorBody))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.rbac.delete_permission(&permission_id)?;
    Ok(StatusCode::NO_CONTENT)
}
