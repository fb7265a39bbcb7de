// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    error::{ApiError, ErrorBody},
    state::AppState,
};

/// Revoke any session by ID. Its access tokens fail validation from now on.
#[utoipa::path(
    delete,
    path = "/v1/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session ID")),
    tag = "Sessions",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 404, description = "No live session with this ID", body = ErrorBody)
    )
)]
pub async fn revoke_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.auth.revoke(&session_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Session {session_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn revoke_live_then_missing_session() {
        let (state, _dir) = test_state();
        let pair = state.auth.issue_tokens("U1", vec![]).unwrap();
        let sid = state.auth.validate(&pair.access_token).unwrap().session_id;

        let status = revoke_session(State(state.clone()), Path(sid.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = revoke_session(State(state), Path(sid)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
