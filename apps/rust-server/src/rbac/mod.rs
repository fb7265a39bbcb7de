// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Role-Based Access Control
//!
//! Roles and permissions are records in the embedded database; users hold
//! roles, roles hold permissions.
//!
//! ## Request Flow
//!
//! 1. `auth::middleware::authenticate` attaches a `SessionContext`
//! 2. The route's `PermissionGate` (see [`enforcer`]) checks the declared key:
//!    - admin role holders pass without consulting the store
//!    - everyone else needs `RbacStore::has_permission` to return `true`
//! 3. Any store error denies the request
//!
//! ## Catalog Sync
//!
//! Every guarded route declares its key at registration time. Before the
//! listener binds, [`registry::PermissionRegistry::sync`] creates missing
//! permission records and resets the admin role to hold all of them.

use crate::storage::StoreError;

pub mod enforcer;
pub mod model;
pub mod permission;
pub mod registry;
pub mod store;

pub use enforcer::{enforce, Enforcer, PermissionChecker, PermissionGate};
pub use model::{Permission, Role, RoleUpdate};
pub use permission::PermissionKey;
pub use registry::{PermissionRegistry, SYSTEM_ADMIN_PERMISSION};
pub use store::RbacStore;

#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    #[error("Invalid permission key: {0}")]
    InvalidPermissionKey(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("None of the given permission keys resolve to a known permission")]
    NoPermissionsResolved,

    #[error("Role {0} is protected")]
    ProtectedRole(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

macro_rules! storage_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for RbacError {
                fn from(e: $source) -> Self {
                    RbacError::Storage(e.into())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    serde_json::Error,
);
