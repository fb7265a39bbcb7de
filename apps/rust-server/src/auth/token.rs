// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token codec (HS256 JWT).
//!
//! Stateless and free of I/O: safe to share across any number of concurrent
//! requests. Revocation is handled one layer up by the session store.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::AccessClaims;
use super::AuthError;

/// Minimum HMAC secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Static token settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Expiration (unix seconds)
    pub expires_at: i64,
}

/// Creates and verifies signed access tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from settings.
    ///
    /// # Errors
    /// `AuthError::Internal` if the secret is shorter than [`MIN_SECRET_LEN`]
    /// or the TTL is zero. Callers treat this as a fatal startup error.
    pub fn new(settings: TokenSettings) -> Result<Self, AuthError> {
        if settings.secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Internal(format!(
                "signing secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if settings.access_ttl.is_zero() {
            return Err(AuthError::Internal(
                "access token TTL must be positive".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&settings.secret),
            decoding_key: DecodingKey::from_secret(&settings.secret),
            validation,
            issuer: settings.issuer,
            audience: settings.audience,
            access_ttl: settings.access_ttl,
        })
    }

    /// Lifetime of the tokens this codec signs.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign an access token for the given session.
    pub fn generate(
        &self,
        session_id: &str,
        subject: &str,
        roles: &[String],
    ) -> Result<IssuedToken, AuthError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.access_ttl.as_secs()).unwrap_or(i64::MAX);
        let exp = iat.saturating_add(ttl);

        let claims = AccessClaims {
            sid: session_id.to_string(),
            sub: subject.to_string(),
            roles: roles.to_vec(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign access token: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
        })
    }

    /// Verify signature and expiry and return the claims.
    pub fn parse(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    pub(crate) fn test_codec() -> TokenCodec {
        TokenCodec::new(TokenSettings {
            secret: TEST_SECRET.to_vec(),
            issuer: "warden".to_string(),
            audience: "warden-api".to_string(),
            access_ttl: Duration::from_secs(900),
        })
        .unwrap()
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn generate_then_parse_roundtrip() {
        let codec = test_codec();
        let issued = codec.generate("sess-1", "user-1", &roles(&["USER"])).unwrap();

        let claims = codec.parse(&issued.token).unwrap();
        assert_eq!(claims.sid, "sess-1");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.roles, roles(&["USER"]));
        assert_eq!(claims.iss, "warden");
        assert_eq!(claims.aud, "warden-api");
        assert_eq!(claims.exp, issued.expires_at);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn wrong_key_is_invalid_token() {
        let issued = test_codec().generate("s", "u", &[]).unwrap();
        let other = TokenCodec::new(TokenSettings {
            secret: b"ffffffffffffffffffffffffffffffff".to_vec(),
            issuer: "warden".to_string(),
            audience: "warden-api".to_string(),
            access_ttl: Duration::from_secs(900),
        })
        .unwrap();

        assert!(matches!(other.parse(&issued.token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_invalid() {
        let codec = test_codec();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sid: "s".to_string(),
            sub: "u".to_string(),
            roles: vec![],
            iss: "warden".to_string(),
            aud: "warden-api".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap();

        assert!(matches!(codec.parse(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn malformed_and_tampered_tokens_are_invalid() {
        let codec = test_codec();
        assert!(matches!(codec.parse("not-a-jwt"), Err(AuthError::InvalidToken)));
        assert!(matches!(codec.parse(""), Err(AuthError::InvalidToken)));

        let issued = codec.generate("s", "u", &[]).unwrap();
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        parts[2] = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let tampered = parts.join(".");
        assert!(matches!(codec.parse(&tampered), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn short_secret_is_rejected_at_construction() {
        let result = TokenCodec::new(TokenSettings {
            secret: b"too-short".to_vec(),
            issuer: "warden".to_string(),
            audience: "warden-api".to_string(),
            access_ttl: Duration::from_secs(900),
        });
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
