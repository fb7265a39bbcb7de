// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role management and role↔permission assignment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ErrorBody},
    rbac::{Permission, Role, RoleUpdate},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    /// Role name, stored uppercase
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermissionsRequest {
    /// Complete set of permission keys the role holds afterwards
    pub permissions: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/v1/roles",
    tag = "Roles",
    security(("bearer" = [])),
    responses((status = 200, body = [Role]))
)]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.rbac.list_roles()?))
}

#[utoipa::path(
    post,
    path = "/v1/roles",
    request_body = CreateRoleRequest,
    tag = "Roles",
    security(("bearer" = [])),
    responses(
        (status = 201, body = Role),
        (status = 409, description = "Name taken", body = ErrorBody)
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let role = state.rbac.create_role(&request.name, &request.description)?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/v1/roles/{role_id}",
    params(("role_id" = String, Path, description = "Role ID")),
    tag = "Roles",
    security(("bearer" = [])),
    responses((status = 200, body = Role), (status = 404, body = ErrorBody))
)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.rbac.get_role(&role_id)?))
}

/// Rename or re-describe a role. The admin role cannot be renamed.
#[utoipa::path(
    put,
    path = "/v1/roles/{role_id}",
    params(("role_id" = String, Path, description = "Role ID")),
    request_body = RoleUpdate,
    tag = "Roles",
    security(("bearer" = [])),
    responses(
        (status = 200, body = Role),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Name taken or role protected", body = ErrorBody)
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.rbac.update_role(&role_id, update)?))
}

#[utoipa::path(
    delete,
    path = "/v1/roles/{role_id}",
    params(("role_id" = String, Path, description = "Role ID")),
    tag = "Roles",
    security(("bearer" = [])),
    responses(
        (status = 204),
        (status = 404, body = ErrorBody),
        (status = 409, description = "Role protected", body = ErrorBody)
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.rbac.delete_role(&role_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/roles/{role_id}/permissions",
    params(("role_id" = String, Path, description = "Role ID")),
    tag = "Roles",
    security(("bearer" = [])),
    responses((status = 200, body = [Permission]), (status = 404, body = ErrorBody))
)]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    Ok(Json(state.rbac.role_permissions(&role_id)?))
}

/// Replace a role's permission set.
///
/// Unknown and malformed keys are ignored; the call fails if none resolve.
#[utoipa::path(
    put,
    path = "/v1/roles/{role_id}/permissions",
    params(("role_id" = String, Path, description = "Role ID")),
    request_body = AssignPermissionsRequest,
    tag = "Roles",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [Permission]),
        (status = 404, body = ErrorBody),
        (status = 422, description = "No key resolved to a permission", body = ErrorBody)
    )
)]
pub async fn assign_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(request): Json<AssignPermissionsRequest>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    Ok(Json(
        state
            .rbac
            .assign_permissions(&role_id, &request.permissions)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn create_then_get_role() {
        let (state, _dir) = test_state();
        let (status, Json(created)) = create_role(
            State(state.clone()),
            Json(CreateRoleRequest {
                name: "biller".to_string(),
                description: "Billing staff".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.name, "BILLER");

        let Json(fetched) = get_role(State(state), Path(created.id.clone())).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn deleting_admin_role_is_rejected() {
        let (state, _dir) = test_state();
        let admin = state.rbac.ensure_admin_has_all_permissions().unwrap();

        let err = delete_role(State(state), Path(admin.id)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "protected_role");
    }

    #[tokio::test]
    async fn assigning_only_unknown_permissions_is_422() {
        let (state, _dir) = test_state();
        let role = state.rbac.create_role("BILLER", "").unwrap();

        let err = assign_role_permissions(
            State(state),
            Path(role.id),
            Json(AssignPermissionsRequest {
                permissions: vec!["billing:view".to_string()],
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
