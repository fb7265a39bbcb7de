// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission keys.
//!
//! The wire format is lowercase `resource:action`. A key with only one
//! non-empty side is valid: a resource-only key is written bare (`billing`),
//! an action-only key keeps its leading separator (`:view`). A bare key
//! always parses as a resource, so formatting and parsing are inverses for
//! every valid key.

use std::fmt;

use super::RbacError;

const SEPARATOR: char = ':';

/// Canonical `resource:action` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey {
    resource: String,
    action: String,
}

fn normalize_part(part: &str) -> String {
    part.trim().to_lowercase()
}

impl PermissionKey {
    /// Build a key from its two sides. At least one side must be non-empty
    /// and neither may contain the separator or whitespace.
    pub fn new(resource: &str, action: &str) -> Result<Self, RbacError> {
        let resource = normalize_part(resource);
        let action = normalize_part(action);

        if resource.is_empty() && action.is_empty() {
            return Err(RbacError::InvalidPermissionKey(
                "resource and action are both empty".to_string(),
            ));
        }
        for part in [&resource, &action] {
            if part.contains(SEPARATOR) || part.chars().any(char::is_whitespace) {
                return Err(RbacError::InvalidPermissionKey(format!(
                    "'{part}' contains ':' or whitespace"
                )));
            }
        }

        Ok(Self { resource, action })
    }

    /// Parse a key in wire format, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, RbacError> {
        let trimmed = raw.trim();
        if trimmed.matches(SEPARATOR).count() > 1 {
            return Err(RbacError::InvalidPermissionKey(raw.to_string()));
        }
        match trimmed.split_once(SEPARATOR) {
            Some((resource, action)) => Self::new(resource, action),
            None => Self::new(trimmed, ""),
        }
        .map_err(|_| RbacError::InvalidPermissionKey(raw.to_string()))
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub(crate) fn index_key(&self) -> String {
        index_key(&self.resource, &self.action)
    }
}

/// Unique index key. Unlike the display form this always carries the
/// separator, so `billing` (resource) and `:billing` (action) differ.
pub(crate) fn index_key(resource: &str, action: &str) -> String {
    format!("{resource}{SEPARATOR}{action}")
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.resource.is_empty(), self.action.is_empty()) {
            (false, false) => write!(f, "{}{SEPARATOR}{}", self.resource, self.action),
            (false, true) => f.write_str(&self.resource),
            _ => write!(f, "{SEPARATOR}{}", self.action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse_are_inverse_for_full_keys() {
        for key in ["billing:view", "user:assign_roles", "system:admin", "a:b"] {
            assert_eq!(PermissionKey::parse(key).unwrap().to_string(), key);
        }
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let key = PermissionKey::parse("  Billing:VIEW ").unwrap();
        assert_eq!(key.resource(), "billing");
        assert_eq!(key.action(), "view");
        assert_eq!(key.to_string(), "billing:view");
    }

    #[test]
    fn single_sided_keys_keep_their_side() {
        let resource_only = PermissionKey::parse("billing").unwrap();
        assert_eq!(resource_only.action(), "");
        assert_eq!(resource_only.to_string(), "billing");

        let trailing = PermissionKey::parse("billing:").unwrap();
        assert_eq!(trailing, resource_only);

        let action_only = PermissionKey::parse(":view").unwrap();
        assert_eq!(action_only.resource(), "");
        assert_eq!(action_only.action(), "view");
        assert_eq!(action_only.to_string(), ":view");
        assert_ne!(action_only, PermissionKey::parse("view").unwrap());
    }

    #[test]
    fn display_reparses_to_the_same_key() {
        for raw in ["billing", "billing:", ":view", " :VIEW", "billing:view", "Role:List"] {
            let key = PermissionKey::parse(raw).unwrap();
            assert_eq!(PermissionKey::parse(&key.to_string()).unwrap(), key, "{raw:?}");
            assert_eq!(
                PermissionKey::parse(&key.to_string()).unwrap().index_key(),
                key.index_key()
            );
        }
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for bad in ["", "   ", ":", "a:b:c", "bill ing:view", "billing:vi ew"] {
            assert!(
                matches!(PermissionKey::parse(bad), Err(RbacError::InvalidPermissionKey(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn new_rejects_separator_inside_a_side() {
        assert!(PermissionKey::new("a:b", "c").is_err());
        assert!(PermissionKey::new("", "").is_err());
        assert_eq!(PermissionKey::new("Role", "List").unwrap().to_string(), "role:list");
    }
}
