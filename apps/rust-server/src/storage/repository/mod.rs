// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the embedded database.
//!
//! Each repository provides CRUD operations for a specific entity type.
//! Roles and permissions live in `crate::rbac::store`.

pub mod users;

pub use users::{StoredUser, UserRepository};
