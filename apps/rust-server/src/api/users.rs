// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{Auth, SessionContext},
    error::{ApiError, ErrorBody},
    state::AppState,
    storage::StoredUser,
};

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// User ID
    pub user_id: String,
    /// Current session ID
    pub session_id: String,
    /// Roles snapshotted into the session at login
    pub roles: Vec<String>,
    /// Whether the session holds the admin role
    pub is_admin: bool,
}

/// A user as returned by the API. The password hash never leaves the store.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    /// Roles currently assigned (not necessarily those of live sessions)
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    fn new(user: StoredUser, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            roles,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    /// Initial role names
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRolesRequest {
    /// Complete set of role names the user holds afterwards
    pub roles: Vec<String>,
}

/// Get the current authenticated user's information.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token", body = ErrorBody),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Auth(session): Auth,
) -> Json<UserMeResponse> {
    let is_admin = session.is_admin(state.admin_role());
    let SessionContext {
        session_id,
        user_id,
        roles,
    } = session;
    Json(UserMeResponse {
        user_id,
        session_id,
        roles,
        is_admin,
    })
}

#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [UserResponse]),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.users.list()?;
    let mut result = Vec::with_capacity(users.len());
    for user in users {
        let roles = state.rbac.user_roles(&user.id)?;
        result.push(UserResponse::new(user, roles));
    }
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 201, body = UserResponse),
        (status = 404, description = "Unknown role", body = ErrorBody),
        (status = 409, description = "Username taken", body = ErrorBody)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if request.username.trim().is_empty() {
        return Err(ApiError::bad_request("username must not be empty"));
    }
    if request.password.is_empty() {
        return Err(ApiError::bad_request("password must not be empty"));
    }
    // The user and its role links commit together; an unknown role aborts both.
    let (user, assigned) = state
        .users
        .create_with(&request.username, &request.password, |txn, user| {
            state.rbac.assign_roles_in(txn, &user.id, &request.roles)
        })?;
    let roles = assigned.into_iter().map(|role| role.name).collect();

    Ok((StatusCode::CREATED, Json(UserResponse::new(user, roles))))
}

/// Replace a user's roles.
///
/// Takes effect for sessions issued after this call.
#[utoipa::path(
    put,
    path = "/v1/users/{user_id}/roles",
    params(
        ("user_id" = String, Path, description = "User ID")
    ),
    request_body = AssignRolesRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, body = UserResponse),
        (status = 404, description = "Unknown user or role", body = ErrorBody)
    )
)]
pub async fn assign_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AssignRolesRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.get(&user_id)?;
    let roles = state
        .rbac
        .assign_roles(&user.id, &request.roles)?
        .into_iter()
        .map(|role| role.name)
        .collect();
    Ok(Json(UserResponse::new(user, roles)))
}
