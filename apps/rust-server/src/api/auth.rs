// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, token refresh and logout.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::{Auth, AuthError, TokenPair},
    error::{ApiError, ErrorBody},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Exchange username and password for a token pair.
///
/// The session's roles are the user's roles at this moment; later role
/// changes apply from the next login.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "New session", body = TokenPair),
        (status = 401, description = "Invalid username or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let Some(user) = state
        .users
        .verify_credentials(&request.username, &request.password)?
    else {
        tracing::info!(username = %request.username.trim(), "Login rejected");
        return Err(AuthError::InvalidCredentials.into());
    };

    let roles = state.rbac.user_roles(&user.id)?;
    let pair = state.auth.issue_tokens(&user.id, roles)?;
    Ok(Json(pair))
}

/// Rotate a refresh token.
///
/// The presented refresh token is single-use: a second call with the same
/// value fails with `invalid_refresh_token`.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Unknown, rotated or expired refresh token", body = ErrorBody)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    Ok(Json(state.auth.refresh(request.refresh_token.trim())?))
}

/// End the caller's session. Its access and refresh tokens stop working.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Auth(session): Auth,
) -> Result<StatusCode, ApiError> {
    state.auth.revoke(&session.session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    fn login_request(username: &str, password: &str) -> Json<LoginRequest> {
        Json(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn login_issues_tokens_with_current_roles() {
        let (state, _dir) = test_state();
        let user = state.users.create("alice", "pw").unwrap();
        state.rbac.create_role("USER", "").unwrap();
        state.rbac.assign_roles(&user.id, ["USER"]).unwrap();

        let Json(pair) = login(State(state.clone()), login_request("Alice", "pw"))
            .await
            .unwrap();

        let session = state.auth.validate(&pair.access_token).unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.roles, vec!["USER"]);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_401() {
        let (state, _dir) = test_state();
        state.users.create("alice", "pw").unwrap();

        let err = login(State(state.clone()), login_request("alice", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "invalid_credentials");

        let err = login(State(state), login_request("mallory", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.code, "invalid_credentials");
    }

    #[tokio::test]
    async fn refresh_rejects_replayed_token() {
        let (state, _dir) = test_state();
        let first = state.auth.issue_tokens("U1", vec!["USER".to_string()]).unwrap();

        let request = || {
            Json(RefreshRequest {
                refresh_token: first.refresh_token.clone(),
            })
        };
        let Json(second) = refresh(State(state.clone()), request()).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let err = refresh(State(state), request()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "invalid_refresh_token");
    }

    #[tokio::test]
    async fn logout_revokes_session() {
        let (state, _dir) = test_state();
        let pair = state.auth.issue_tokens("U1", vec![]).unwrap();
        let session = state.auth.validate(&pair.access_token).unwrap();

        let status = logout(State(state.clone()), Auth(session)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(matches!(
            state.auth.validate(&pair.access_token),
            Err(AuthError::SessionNotFound)
        ));
    }
}
