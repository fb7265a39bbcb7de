// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startup seeding: permission catalog sync and the optional bootstrap admin.

use crate::{
    config::{AppConfig, BootstrapAdmin},
    rbac::{PermissionRegistry, RbacError},
    state::AppState,
    storage::StoredUser,
};

/// Sync the route permissions into the catalog (unless disabled) and seed
/// the configured admin account.
pub fn seed(
    config: &AppConfig,
    state: &AppState,
    registry: &PermissionRegistry,
) -> Result<(), RbacError> {
    if config.sync_admin_permissions {
        registry.sync(&state.rbac)?;
    } else {
        tracing::info!("Permission catalog sync disabled");
    }

    if let Some(admin) = &config.bootstrap_admin {
        let user = ensure_admin_user(state, admin)?;
        tracing::info!(user_id = %user.id, username = %user.username, "Bootstrap admin ready");
    }
    Ok(())
}

/// Create the admin user if missing and make sure it holds the admin role.
///
/// Roles the user already has are kept. The password of an existing user is
/// never changed.
pub fn ensure_admin_user(state: &AppState, admin: &BootstrapAdmin) -> Result<StoredUser, RbacError> {
    let user = state.users.ensure(&admin.username, &admin.password)?;
    let admin_role = state.admin_role().to_string();

    if state.rbac.find_role_by_name(&admin_role)?.is_none() {
        state
            .rbac
            .create_role(&admin_role, "Unrestricted access to every route")?;
    }

    let mut roles = state.rbac.user_roles(&user.id)?;
    if !roles.contains(&admin_role) {
        roles.push(admin_role);
        state.rbac.assign_roles(&user.id, &roles)?;
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            username: "root".to_string(),
            password: "bootstrap-pw".to_string(),
        }
    }

    #[test]
    fn creates_user_and_admin_role() {
        let (state, _dir) = test_state();
        let user = ensure_admin_user(&state, &admin()).unwrap();

        assert_eq!(state.rbac.user_roles(&user.id).unwrap(), vec!["ADMIN"]);
        assert!(state
            .users
            .verify_credentials("root", "bootstrap-pw")
            .unwrap()
            .is_some());
    }

    #[test]
    fn keeps_existing_roles_and_is_idempotent() {
        let (state, _dir) = test_state();
        state.rbac.create_role("AUDITOR", "").unwrap();
        let user = state.users.create("root", "original").unwrap();
        state.rbac.assign_roles(&user.id, ["AUDITOR"]).unwrap();

        ensure_admin_user(&state, &admin()).unwrap();
        ensure_admin_user(&state, &admin()).unwrap();

        assert_eq!(
            state.rbac.user_roles(&user.id).unwrap(),
            vec!["ADMIN", "AUDITOR"]
        );
        // Existing password untouched.
        assert!(state
            .users
            .verify_credentials("root", "original")
            .unwrap()
            .is_some());
    }
}
