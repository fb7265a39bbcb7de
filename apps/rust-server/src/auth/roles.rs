// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role name normalization.
//!
//! Roles are dynamic records in the RBAC store; their names are compared in
//! canonical uppercase form everywhere.

/// Default name of the role that bypasses permission checks.
pub const DEFAULT_ADMIN_ROLE: &str = "ADMIN";

/// Canonical form of a role name: trimmed, uppercase.
pub fn normalize_role_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Whether `role` names the admin role.
pub fn is_admin_role(role: &str, admin_role: &str) -> bool {
    normalize_role_name(role) == normalize_role_name(admin_role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_role_name("  biller "), "BILLER");
        assert_eq!(normalize_role_name("Admin"), "ADMIN");
    }

    #[test]
    fn admin_role_matches_any_case() {
        assert!(is_admin_role("admin", DEFAULT_ADMIN_ROLE));
        assert!(is_admin_role("ADMIN", "admin"));
        assert!(!is_admin_role("ADMINISTRATOR", DEFAULT_ADMIN_ROLE));
    }
}
