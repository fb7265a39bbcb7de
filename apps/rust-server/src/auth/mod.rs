// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session-backed access tokens with single-use refresh tokens.
//!
//! ## Auth Flow
//!
//! 1. `POST /auth/login` verifies the password and calls
//!    [`AuthService::issue_tokens`], which creates a server-side session
//! 2. Clients send `Authorization: Bearer <access token>`
//! 3. [`middleware::authenticate`]:
//!    - verifies the token signature and expiry (no I/O)
//!    - loads the session named by the `sid` claim
//!    - attaches a [`SessionContext`] to the request
//! 4. `POST /auth/refresh` trades the refresh token for a new pair; the old
//!    refresh token stops working in the same atomic write
//!
//! ## Security
//!
//! - Deleting a session revokes its access tokens before they expire
//! - Replaying a rotated refresh token yields `InvalidRefreshToken`
//! - Tokens are never logged

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod roles;
pub mod service;
pub mod session;
pub mod token;

pub use claims::{AccessClaims, SessionContext};
pub use error::AuthError;
pub use extractor::Auth;
pub use service::{AuthService, TokenPair};
pub use session::{KvSessionStore, Session, SessionStore};
pub use token::{TokenCodec, TokenSettings};
