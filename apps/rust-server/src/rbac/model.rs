// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PermissionKey;

/// A named bundle of permissions. Names are stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    /// Role ID (UUID)
    pub id: String,
    /// Unique, uppercase role name
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
}

/// One authorizable capability. Unique by `(resource, action)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    /// Permission ID (UUID)
    pub id: String,
    /// Wire-format key, e.g. `billing:view`
    pub key: String,
    /// Lowercase resource, may be empty
    pub resource: String,
    /// Lowercase action, may be empty
    pub action: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
}

impl Permission {
    pub(crate) fn from_key(key: &PermissionKey, description: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            resource: key.resource().to_string(),
            action: key.action().to_string(),
            description: description.trim().to_string(),
        }
    }

    pub(crate) fn index_key(&self) -> String {
        super::permission::index_key(&self.resource, &self.action)
    }
}

/// Partial role update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RoleUpdate {
    /// New role name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
}
