// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token lifecycle: issue, refresh with rotation, validate, revoke.
//!
//! ## Session States
//!
//! ```text
//! Anonymous ──issue──▶ Active ──refresh──▶ Active ──…──▶ Expired / Revoked
//! ```
//!
//! Roles are snapshotted into the session at issue time and carried forward
//! on every refresh; they are not re-read from the RBAC store. Role changes
//! therefore take effect at the next login.

use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::claims::SessionContext;
use super::session::{Session, SessionStore};
use super::token::TokenCodec;
use super::AuthError;

/// Refresh tokens carry 256 bits of entropy.
const REFRESH_TOKEN_BYTES: usize = 32;

/// Access/refresh token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Signed access token (send as `Authorization: Bearer <token>`)
    pub access_token: String,
    /// Single-use refresh token
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Combines the token codec and the session store.
pub struct AuthService {
    codec: TokenCodec,
    sessions: Arc<dyn SessionStore>,
    refresh_ttl: Duration,
    rng: SystemRandom,
}

impl AuthService {
    pub fn new(codec: TokenCodec, sessions: Arc<dyn SessionStore>, refresh_ttl: Duration) -> Self {
        Self {
            codec,
            sessions,
            refresh_ttl,
            rng: SystemRandom::new(),
        }
    }

    fn new_refresh_token(&self) -> Result<String, AuthError> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AuthError::Internal("system random source unavailable".to_string()))?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }

    fn token_pair(&self, session: &Session) -> Result<TokenPair, AuthError> {
        let issued = self
            .codec
            .generate(&session.session_id, &session.user_id, &session.roles)?;
        Ok(TokenPair {
            access_token: issued.token,
            refresh_token: session.refresh_token.clone(),
            expires_in: self.codec.access_ttl().as_secs(),
        })
    }

    /// Start a new session for `user_id`. The only place a session is born.
    pub fn issue_tokens(&self, user_id: &str, roles: Vec<String>) -> Result<TokenPair, AuthError> {
        let session = Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            roles,
            refresh_token: self.new_refresh_token()?,
        };

        let pair = self.token_pair(&session)?;
        self.sessions.save(&session, self.refresh_ttl)?;

        tracing::info!(
            user_id = %session.user_id,
            session_id = %session.session_id,
            "Session issued"
        );
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// invalidated in the same atomic write that installs its successor.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let current = self.sessions.get_by_refresh_token(refresh_token)?;

        let rotated = Session {
            refresh_token: self.new_refresh_token()?,
            ..current
        };
        let pair = self.token_pair(&rotated)?;

        self.sessions
            .replace_refresh_token(&rotated, refresh_token, self.refresh_ttl)
            .inspect_err(|e| {
                if matches!(e, AuthError::InvalidRefreshToken) {
                    tracing::warn!(
                        session_id = %rotated.session_id,
                        "Refresh token rotation lost to a concurrent refresh"
                    );
                }
            })?;

        tracing::debug!(session_id = %rotated.session_id, "Session refreshed");
        Ok(pair)
    }

    /// Verify an access token and confirm its session is still live.
    pub fn validate(&self, access_token: &str) -> Result<SessionContext, AuthError> {
        let claims = self.codec.parse(access_token)?;
        let session = self.sessions.get(&claims.sid)?;

        Ok(SessionContext {
            session_id: session.session_id,
            user_id: session.user_id,
            roles: session.roles,
        })
    }

    /// End a session before its natural expiry. Returns whether it existed.
    pub fn revoke(&self, session_id: &str) -> Result<bool, AuthError> {
        let existed = self.sessions.delete(session_id)?;
        if existed {
            tracing::info!(session_id = %session_id, "Session revoked");
        }
        Ok(existed)
    }
}
