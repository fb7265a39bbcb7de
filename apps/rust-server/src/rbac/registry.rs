// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startup permission registry.
//!
//! Collects the permission key of every guarded route while the router is
//! built, then reconciles the persisted catalog with it in one pass.

use std::collections::BTreeSet;

use super::{PermissionKey, RbacError, RbacStore};

/// Reserved key that always exists and is always held by the admin role.
pub const SYSTEM_ADMIN_PERMISSION: &str = "system:admin";

/// Outcome of a catalog sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys the registry declared, including the reserved one
    pub declared: usize,
    /// Permissions that did not exist before this sync
    pub created: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    keys: BTreeSet<PermissionKey>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a route's key. Empty keys (authenticated-only routes) are not
    /// permissions and are ignored.
    pub fn register(&mut self, permission: &str) {
        if permission.trim().is_empty() {
            return;
        }
        match PermissionKey::parse(permission) {
            Ok(key) => {
                self.keys.insert(key);
            }
            Err(e) => tracing::warn!(error = %e, "Route declares an invalid permission key"),
        }
    }

    /// Every declared key plus [`SYSTEM_ADMIN_PERMISSION`], sorted and
    /// deduplicated.
    pub fn keys(&self) -> Vec<String> {
        let mut all = self.keys.clone();
        if let Ok(reserved) = PermissionKey::parse(SYSTEM_ADMIN_PERMISSION) {
            all.insert(reserved);
        }
        all.iter().map(ToString::to_string).collect()
    }

    /// Create missing permissions, then reset the admin role to hold all of
    /// them. Must complete before the listener accepts traffic.
    pub fn sync(&self, store: &RbacStore) -> Result<SyncReport, RbacError> {
        let keys = self.keys();
        let created = store.ensure_permissions_exist(&keys)?;
        store.ensure_admin_has_all_permissions()?;

        let report = SyncReport {
            declared: keys.len(),
            created: created.into_iter().map(|p| p.key).collect(),
        };
        tracing::info!(
            declared = report.declared,
            created = report.created.len(),
            "Permission catalog synchronized"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_database;

    #[test]
    fn keys_are_normalized_deduplicated_and_include_reserved() {
        let mut registry = PermissionRegistry::new();
        registry.register("role:list");
        registry.register("ROLE:LIST");
        registry.register("");
        registry.register("user:create");
        registry.register("broken:key:x");

        assert_eq!(
            registry.keys(),
            vec!["role:list", "system:admin", "user:create"]
        );
    }

    #[test]
    fn sync_builds_catalog_and_admin_grants() {
        let (db, _dir) = temp_database();
        let store = RbacStore::new(db, "ADMIN");
        let mut registry = PermissionRegistry::new();
        registry.register("role:list");
        registry.register("role:create");

        let first = registry.sync(&store).unwrap();
        assert_eq!(first.declared, 3);
        assert_eq!(first.created.len(), 3);

        let second = registry.sync(&store).unwrap();
        assert!(second.created.is_empty());

        let admin = store.find_role_by_name("ADMIN").unwrap().unwrap();
        let granted: Vec<String> = store
            .role_permissions(&admin.id)
            .unwrap()
            .into_iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(granted, vec!["role:create", "role:list", "system:admin"]);
    }
}
