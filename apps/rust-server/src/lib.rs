// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Warden - Session-Backed Authentication & RBAC Service
//!
//! Issues short-lived access tokens bound to server-side sessions, rotates
//! single-use refresh tokens and gates every route behind a declared
//! permission key.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Token codec, session store and authentication middleware
//! - `rbac` - Permission catalog, role store and enforcement middleware
//! - `storage` - redb database, TTL key-value engine and user directory

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod rbac;
pub mod session_sweeper;
pub mod state;
pub mod storage;
