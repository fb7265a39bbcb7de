// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the authenticated session.
//!
//! Use the `Auth` extractor in handlers mounted behind the authentication
//! middleware:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(session): Auth) -> impl IntoResponse {
//!     // session is SessionContext
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, SessionContext};

/// Extractor for the session attached by `middleware::authenticate`.
///
/// Rejects with `Unauthenticated` when the handler is reachable without the
/// middleware having run.
pub struct Auth(pub SessionContext);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts() -> Parts {
        Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn auth_extractor_reads_extensions() {
        let mut parts = parts();
        parts.extensions.insert(SessionContext {
            session_id: "sess_abc".to_string(),
            user_id: "user_from_middleware".to_string(),
            roles: vec!["USER".to_string()],
        });

        let Auth(session) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(session.user_id, "user_from_middleware");
    }

    #[tokio::test]
    async fn auth_extractor_without_middleware_is_unauthenticated() {
        let mut parts = parts();
        let result = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }
}
