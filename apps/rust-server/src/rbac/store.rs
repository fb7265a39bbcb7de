// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persistent roles, permissions and their assignments.
//!
//! Every mutation runs in one redb write transaction; a failed check aborts
//! it and nothing is visible. Role↔permission and user↔role sets are always
//! replaced wholesale, never patched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    Table, TableDefinition, WriteTransaction,
};

use super::enforcer::PermissionChecker;
use super::{Permission, PermissionKey, RbacError, Role, RoleUpdate};
use crate::auth::roles::{is_admin_role, normalize_role_name};

/// role_id → Role (JSON bytes)
const ROLES: TableDefinition<&str, &[u8]> = TableDefinition::new("roles");
/// NAME → role_id
const ROLE_NAMES: TableDefinition<&str, &str> = TableDefinition::new("role_names");
/// permission_id → Permission (JSON bytes)
const PERMISSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("permissions");
/// resource:action → permission_id
const PERMISSION_KEYS: TableDefinition<&str, &str> = TableDefinition::new("permission_keys");
/// role_id ⇉ permission_id
const ROLE_PERMISSIONS: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("role_permissions");
/// user_id ⇉ role_id
const USER_ROLES: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("user_roles");

pub(crate) fn create_tables(txn: &WriteTransaction) -> Result<(), redb::TableError> {
    let _ = txn.open_table(ROLES)?;
    let _ = txn.open_table(ROLE_NAMES)?;
    let _ = txn.open_table(PERMISSIONS)?;
    let _ = txn.open_table(PERMISSION_KEYS)?;
    let _ = txn.open_multimap_table(ROLE_PERMISSIONS)?;
    let _ = txn.open_multimap_table(USER_ROLES)?;
    Ok(())
}

type RbacResult<T> = Result<T, RbacError>;

// =============================================================================
// Table Helpers
// =============================================================================

fn load_json<T, R>(table: &T, id: &str) -> RbacResult<Option<R>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    R: serde::de::DeserializeOwned,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn load_all<T, R>(table: &T) -> RbacResult<Vec<R>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    R: serde::de::DeserializeOwned,
{
    let mut out = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        out.push(serde_json::from_slice(value.value())?);
    }
    Ok(out)
}

fn lookup_id<T>(index: &T, key: &str) -> RbacResult<Option<String>>
where
    T: ReadableTable<&'static str, &'static str>,
{
    Ok(index.get(key)?.map(|id| id.value().to_string()))
}

fn linked_ids<T>(table: &T, key: &str) -> RbacResult<Vec<String>>
where
    T: ReadableMultimapTable<&'static str, &'static str>,
{
    let mut out = Vec::new();
    for value in table.get(key)? {
        out.push(value?.value().to_string());
    }
    Ok(out)
}

fn put_json<R: serde::Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    id: &str,
    record: &R,
) -> RbacResult<()> {
    let json = serde_json::to_vec(record)?;
    table.insert(id, json.as_slice())?;
    Ok(())
}

fn role_not_found(id: &str) -> RbacError {
    RbacError::NotFound(format!("Role {id}"))
}

fn sorted_by_key(mut permissions: Vec<Permission>) -> Vec<Permission> {
    permissions.sort_by(|a, b| a.key.cmp(&b.key));
    permissions
}

// =============================================================================
// Store
// =============================================================================

/// Roles, permissions and assignments backed by redb.
#[derive(Clone)]
pub struct RbacStore {
    db: Arc<Database>,
    admin_role: String,
}

impl RbacStore {
    pub fn new(db: Arc<Database>, admin_role: &str) -> Self {
        Self {
            db,
            admin_role: normalize_role_name(admin_role),
        }
    }

    /// Canonical name of the role that bypasses permission checks.
    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }

    fn in_write<T>(&self, f: impl FnOnce(&WriteTransaction) -> RbacResult<T>) -> RbacResult<T> {
        let txn = self.db.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.abort()?;
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    /// Create every permission in `keys` that does not exist yet.
    ///
    /// Keys are parsed, normalized and deduplicated first; unparseable keys
    /// are skipped with a warning. Existing permissions are left untouched,
    /// so repeated calls are no-ops. Returns the newly created permissions.
    pub fn ensure_permissions_exist<I, S>(&self, keys: I) -> RbacResult<Vec<Permission>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut wanted = BTreeSet::new();
        for raw in keys {
            match PermissionKey::parse(raw.as_ref()) {
                Ok(key) => {
                    wanted.insert(key);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping unparseable permission key"),
            }
        }
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let created = self.in_write(|txn| {
            let mut index = txn.open_table(PERMISSION_KEYS)?;
            let mut permissions = txn.open_table(PERMISSIONS)?;
            let mut created = Vec::new();

            for key in &wanted {
                let index_key = key.index_key();
                if index.get(index_key.as_str())?.is_some() {
                    continue;
                }
                let permission = Permission::from_key(key, "");
                put_json(&mut permissions, &permission.id, &permission)?;
                index.insert(index_key.as_str(), permission.id.as_str())?;
                created.push(permission);
            }
            Ok(created)
        })?;

        if !created.is_empty() {
            tracing::info!(
                created = created.len(),
                requested = wanted.len(),
                "Permission catalog extended"
            );
        }
        Ok(created)
    }

    /// Load or seed the admin role, then replace its permission set with
    /// every known permission.
    pub fn ensure_admin_has_all_permissions(&self) -> RbacResult<Role> {
        let (admin, granted) = self.in_write(|txn| {
            let mut roles = txn.open_table(ROLES)?;
            let mut names = txn.open_table(ROLE_NAMES)?;

            let existing = match lookup_id(&names, &self.admin_role)? {
                Some(id) => load_json::<_, Role>(&roles, &id)?,
                None => None,
            };
            let admin = match existing {
                Some(role) => role,
                None => {
                    let role = Role {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: self.admin_role.clone(),
                        description: "Full access to every permission".to_string(),
                    };
                    put_json(&mut roles, &role.id, &role)?;
                    names.insert(role.name.as_str(), role.id.as_str())?;
                    tracing::info!(role = %role.name, "Seeded admin role");
                    role
                }
            };

            let permissions = txn.open_table(PERMISSIONS)?;
            let mut permission_ids = Vec::new();
            for entry in permissions.iter()? {
                let (id, _) = entry?;
                permission_ids.push(id.value().to_string());
            }

            let mut role_permissions = txn.open_multimap_table(ROLE_PERMISSIONS)?;
            role_permissions.remove_all(admin.id.as_str())?;
            for id in &permission_ids {
                role_permissions.insert(admin.id.as_str(), id.as_str())?;
            }
            Ok((admin, permission_ids.len()))
        })?;

        tracing::info!(role = %admin.name, permissions = granted, "Admin role synchronized");
        Ok(admin)
    }

    // -------------------------------------------------------------------------
    // Roles
    // -------------------------------------------------------------------------

    pub fn create_role(&self, name: &str, description: &str) -> RbacResult<Role> {
        let name = normalize_role_name(name);
        if name.is_empty() {
            return Err(RbacError::Validation("role name must not be empty".to_string()));
        }
        let role = Role {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: description.trim().to_string(),
        };

        self.in_write(|txn| {
            let mut names = txn.open_table(ROLE_NAMES)?;
            if names.get(role.name.as_str())?.is_some() {
                return Err(RbacError::Conflict(format!("Role {}", role.name)));
            }
            names.insert(role.name.as_str(), role.id.as_str())?;
            let mut roles = txn.open_table(ROLES)?;
            put_json(&mut roles, &role.id, &role)
        })?;

        tracing::info!(role_id = %role.id, role = %role.name, "Created role");
        Ok(role)
    }

    pub fn get_role(&self, role_id: &str) -> RbacResult<Role> {
        let read_txn = self.db.begin_read()?;
        let roles = read_txn.open_table(ROLES)?;
        load_json(&roles, role_id)?.ok_or_else(|| role_not_found(role_id))
    }

    /// Case-insensitive lookup by name.
    pub fn find_role_by_name(&self, name: &str) -> RbacResult<Option<Role>> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(ROLE_NAMES)?;
        match lookup_id(&names, &normalize_role_name(name))? {
            Some(id) => {
                let roles = read_txn.open_table(ROLES)?;
                load_json(&roles, &id)
            }
            None => Ok(None),
        }
    }

    pub fn list_roles(&self) -> RbacResult<Vec<Role>> {
        let read_txn = self.db.begin_read()?;
        let roles = read_txn.open_table(ROLES)?;
        let mut result: Vec<Role> = load_all(&roles)?;
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Rename and/or re-describe a role. The admin role keeps its name.
    pub fn update_role(&self, role_id: &str, update: RoleUpdate) -> RbacResult<Role> {
        let role = self.in_write(|txn| {
            let mut roles = txn.open_table(ROLES)?;
            let mut role: Role = load_json(&roles, role_id)?.ok_or_else(|| role_not_found(role_id))?;

            if let Some(new_name) = update.name.as_deref().map(normalize_role_name) {
                if new_name.is_empty() {
                    return Err(RbacError::Validation("role name must not be empty".to_string()));
                }
                if new_name != role.name {
                    if is_admin_role(&role.name, &self.admin_role) {
                        return Err(RbacError::ProtectedRole(role.name));
                    }
                    if is_admin_role(&new_name, &self.admin_role) {
                        return Err(RbacError::ProtectedRole(new_name));
                    }

                    let mut names = txn.open_table(ROLE_NAMES)?;
                    if names.get(new_name.as_str())?.is_some() {
                        return Err(RbacError::Conflict(format!("Role {new_name}")));
                    }
                    names.remove(role.name.as_str())?;
                    names.insert(new_name.as_str(), role_id)?;
                    role.name = new_name;
                }
            }
            if let Some(description) = update.description {
                role.description = description.trim().to_string();
            }

            put_json(&mut roles, role_id, &role)?;
            Ok(role)
        })?;

        tracing::info!(role_id = %role.id, role = %role.name, "Updated role");
        Ok(role)
    }

    /// Delete a role, its permission grants and every user's membership.
    pub fn delete_role(&self, role_id: &str) -> RbacResult<()> {
        let role = self.in_write(|txn| {
            let mut roles = txn.open_table(ROLES)?;
            let role: Role = load_json(&roles, role_id)?.ok_or_else(|| role_not_found(role_id))?;
            if is_admin_role(&role.name, &self.admin_role) {
                return Err(RbacError::ProtectedRole(role.name));
            }

            roles.remove(role_id)?;
            txn.open_table(ROLE_NAMES)?.remove(role.name.as_str())?;
            txn.open_multimap_table(ROLE_PERMISSIONS)?
                .remove_all(role_id)?;

            let mut user_roles = txn.open_multimap_table(USER_ROLES)?;
            let mut holders = Vec::new();
            for entry in user_roles.iter()? {
                let (user_id, role_ids) = entry?;
                for id in role_ids {
                    if id?.value() == role_id {
                        holders.push(user_id.value().to_string());
                    }
                }
            }
            for user_id in &holders {
                user_roles.remove(user_id.as_str(), role_id)?;
            }
            Ok(role)
        })?;

        tracing::info!(role_id = %role.id, role = %role.name, "Deleted role");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Permissions
    // -------------------------------------------------------------------------

    pub fn create_permission(&self, key: &PermissionKey, description: &str) -> RbacResult<Permission> {
        let permission = Permission::from_key(key, description);

        self.in_write(|txn| {
            let mut index = txn.open_table(PERMISSION_KEYS)?;
            let index_key = permission.index_key();
            if index.get(index_key.as_str())?.is_some() {
                return Err(RbacError::Conflict(format!("Permission {}", permission.key)));
            }
            index.insert(index_key.as_str(), permission.id.as_str())?;
            let mut permissions = txn.open_table(PERMISSIONS)?;
            put_json(&mut permissions, &permission.id, &permission)
        })?;

        tracing::info!(permission_id = %permission.id, permission = %permission.key, "Created permission");
        Ok(permission)
    }

    pub fn get_permission(&self, permission_id: &str) -> RbacResult<Permission> {
        let read_txn = self.db.begin_read()?;
        let permissions = read_txn.open_table(PERMISSIONS)?;
        load_json(&permissions, permission_id)?
            .ok_or_else(|| RbacError::NotFound(format!("Permission {permission_id}")))
    }

    pub fn list_permissions(&self) -> RbacResult<Vec<Permission>> {
        let read_txn = self.db.begin_read()?;
        let permissions = read_txn.open_table(PERMISSIONS)?;
        Ok(sorted_by_key(load_all(&permissions)?))
    }

    /// Delete a permission and revoke it from every role.
    pub fn delete_permission(&self, permission_id: &str) -> RbacResult<()> {
        let permission = self.in_write(|txn| {
            let mut permissions = txn.open_table(PERMISSIONS)?;
            let permission: Permission = load_json(&permissions, permission_id)?
                .ok_or_else(|| RbacError::NotFound(format!("Permission {permission_id}")))?;

            permissions.remove(permission_id)?;
            txn.open_table(PERMISSION_KEYS)?
                .remove(permission.index_key().as_str())?;

            let mut role_ids = Vec::new();
            for entry in txn.open_table(ROLES)?.iter()? {
                let (id, _) = entry?;
                role_ids.push(id.value().to_string());
            }
            let mut role_permissions = txn.open_multimap_table(ROLE_PERMISSIONS)?;
            for role_id in &role_ids {
                role_permissions.remove(role_id.as_str(), permission_id)?;
            }
            Ok(permission)
        })?;

        tracing::info!(permission_id = %permission.id, permission = %permission.key, "Deleted permission");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Assignments
    // -------------------------------------------------------------------------

    /// Replace a role's permission set with the permissions `keys` resolve to.
    ///
    /// Unparseable and unknown keys are ignored. Fails with
    /// `NoPermissionsResolved` (and changes nothing) if none resolve.
    pub fn assign_permissions<I, S>(&self, role_id: &str, keys: I) -> RbacResult<Vec<Permission>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let assigned = self.in_write(|txn| {
            let roles = txn.open_table(ROLES)?;
            let role: Role = load_json(&roles, role_id)?.ok_or_else(|| role_not_found(role_id))?;

            let index = txn.open_table(PERMISSION_KEYS)?;
            let permissions = txn.open_table(PERMISSIONS)?;
            let mut resolved = BTreeMap::new();
            for raw in keys {
                let Ok(key) = PermissionKey::parse(raw.as_ref()) else {
                    tracing::debug!(role = %role.name, "Ignoring unparseable permission key");
                    continue;
                };
                let Some(id) = lookup_id(&index, &key.index_key())? else {
                    tracing::debug!(role = %role.name, permission = %key, "Ignoring unknown permission");
                    continue;
                };
                if let Some(permission) = load_json::<_, Permission>(&permissions, &id)? {
                    resolved.insert(id, permission);
                }
            }
            if resolved.is_empty() {
                return Err(RbacError::NoPermissionsResolved);
            }

            let mut role_permissions = txn.open_multimap_table(ROLE_PERMISSIONS)?;
            role_permissions.remove_all(role_id)?;
            for id in resolved.keys() {
                role_permissions.insert(role_id, id.as_str())?;
            }
            Ok(resolved.into_values().collect::<Vec<_>>())
        })?;

        tracing::info!(role_id = %role_id, permissions = assigned.len(), "Replaced role permissions");
        Ok(sorted_by_key(assigned))
    }

    pub fn role_permissions(&self, role_id: &str) -> RbacResult<Vec<Permission>> {
        let read_txn = self.db.begin_read()?;
        let roles = read_txn.open_table(ROLES)?;
        if roles.get(role_id)?.is_none() {
            return Err(role_not_found(role_id));
        }

        let role_permissions = read_txn.open_multimap_table(ROLE_PERMISSIONS)?;
        let permissions = read_txn.open_table(PERMISSIONS)?;
        let mut result = Vec::new();
        for id in linked_ids(&role_permissions, role_id)? {
            if let Some(permission) = load_json(&permissions, &id)? {
                result.push(permission);
            }
        }
        Ok(sorted_by_key(result))
    }

    /// Replace a user's roles. Every name must refer to an existing role.
    pub fn assign_roles<I, S>(&self, user_id: &str, role_names: I) -> RbacResult<Vec<Role>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let assigned = self.in_write(|txn| self.assign_roles_in(txn, user_id, role_names))?;

        tracing::info!(user_id = %user_id, roles = assigned.len(), "Replaced user roles");
        Ok(assigned)
    }

    /// [`assign_roles`](Self::assign_roles) inside a caller-owned write
    /// transaction, so it commits or aborts together with the caller's writes.
    pub fn assign_roles_in<I, S>(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        role_names: I,
    ) -> RbacResult<Vec<Role>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = txn.open_table(ROLE_NAMES)?;
        let roles = txn.open_table(ROLES)?;
        let mut resolved = BTreeMap::new();
        for raw in role_names {
            let name = normalize_role_name(raw.as_ref());
            let role: Role = match lookup_id(&names, &name)? {
                Some(id) => load_json(&roles, &id)?,
                None => None,
            }
            .ok_or_else(|| RbacError::NotFound(format!("Role {name}")))?;
            resolved.insert(role.name.clone(), role);
        }

        let mut user_roles = txn.open_multimap_table(USER_ROLES)?;
        user_roles.remove_all(user_id)?;
        for role in resolved.values() {
            user_roles.insert(user_id, role.id.as_str())?;
        }
        Ok(resolved.into_values().collect())
    }

    /// Names of the roles a user holds, sorted.
    pub fn user_roles(&self, user_id: &str) -> RbacResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let user_roles = read_txn.open_multimap_table(USER_ROLES)?;
        let roles = read_txn.open_table(ROLES)?;

        let mut names = Vec::new();
        for id in linked_ids(&user_roles, user_id)? {
            if let Some(role) = load_json::<_, Role>(&roles, &id)? {
                names.push(role.name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Whether any of the user's roles carries the permission `key`.
    pub fn has_permission(&self, user_id: &str, key: &str) -> RbacResult<bool> {
        let key = PermissionKey::parse(key)?;

        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PERMISSION_KEYS)?;
        let Some(permission_id) = lookup_id(&index, &key.index_key())? else {
            return Ok(false);
        };

        let user_roles = read_txn.open_multimap_table(USER_ROLES)?;
        let role_permissions = read_txn.open_multimap_table(ROLE_PERMISSIONS)?;
        for role_id in linked_ids(&user_roles, user_id)? {
            if linked_ids(&role_permissions, &role_id)?.contains(&permission_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl PermissionChecker for RbacStore {
    fn has_permission(&self, user_id: &str, key: &str) -> Result<bool, RbacError> {
        RbacStore::has_permission(self, user_id, key)
    }
}
