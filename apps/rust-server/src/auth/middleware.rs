// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Validates the bearer access token against the session store and attaches
//! the resulting [`SessionContext`] to the request extensions, where the
//! permission gates and the [`Auth`](super::Auth) extractor pick it up.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/v1/users/me", get(get_current_user))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
//! ```

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AuthError;
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Authentication middleware function.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let validated = bearer_token(request.headers()).and_then(|token| state.auth.validate(token));

    match validated {
        Ok(session) => {
            tracing::debug!(
                user_id = %session.user_id,
                session_id = %session.session_id,
                "Request authenticated"
            );
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_reported() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[test]
    fn wrong_scheme_or_empty_token_is_invalid() {
        for value in ["Basic dXNlcjpwdw==", "Bearer ", "Bearer    ", "abc.def.ghi"] {
            assert!(
                matches!(bearer_token(&headers(value)), Err(AuthError::InvalidAuthHeader)),
                "accepted {value:?}"
            );
        }
    }
}
