//! Interned permission codes and the per-request effective set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Closed set of authorizable capabilities in the portal.
///
/// Codes are interned here rather than passed around as free-form strings so
/// a typo in a route guard fails at parse time instead of silently denying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageClients,
    ManageServices,
    ManageContent,
    ManageTickets,
    ManageSettings,
    ViewReports,
    ViewDashboard,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManageClients => "manage_clients",
            Permission::ManageServices => "manage_services",
            Permission::ManageContent => "manage_content",
            Permission::ManageTickets => "manage_tickets",
            Permission::ManageSettings => "manage_settings",
            Permission::ViewReports => "view_reports",
            Permission::ViewDashboard => "view_dashboard",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manage_users" => Ok(Permission::ManageUsers),
            "manage_clients" => Ok(Permission::ManageClients),
            "manage_services" => Ok(Permission::ManageServices),
            "manage_content" => Ok(Permission::ManageContent),
            "manage_tickets" => Ok(Permission::ManageTickets),
            "manage_settings" => Ok(Permission::ManageSettings),
            "view_reports" => Ok(Permission::ViewReports),
            "view_dashboard" => Ok(Permission::ViewDashboard),
            _ => Err(format!("Unknown permission code: {}", s)),
        }
    }
}

/// Effective permission set for one request.
///
/// Derived from the role/permission association rows each time an identity
/// is resolved, never cached across requests, so a role change takes effect
/// on the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Any-of semantics: one matching code is sufficient.
    pub fn contains_any(&self, required: &[Permission]) -> bool {
        required.iter().any(|p| self.0.contains(p))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Deterministically ordered code strings, used for token snapshots and
    /// audit metadata.
    pub fn codes(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Role entity; grants are resolved through the role directory contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(label: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            label,
            created_at: Utc::now(),
        }
    }
}

/// An authenticated caller with its per-request effective permission set.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub permissions: PermissionSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_known_codes() {
        assert_eq!(
            Permission::from_str("manage_users").unwrap(),
            Permission::ManageUsers
        );
        assert_eq!(
            Permission::from_str("view_dashboard").unwrap(),
            Permission::ViewDashboard
        );
    }

    #[test]
    fn test_parse_rejects_unknown_code() {
        assert!(Permission::from_str("manage_everything").is_err());
    }

    #[test]
    fn test_round_trips_every_code() {
        for p in [
            Permission::ManageUsers,
            Permission::ManageClients,
            Permission::ManageServices,
            Permission::ManageContent,
            Permission::ManageTickets,
            Permission::ManageSettings,
            Permission::ViewReports,
            Permission::ViewDashboard,
        ] {
            assert_eq!(Permission::from_str(p.as_str()).unwrap(), p);
        }
    }

    #[test]
    fn test_contains_any() {
        let set: PermissionSet =
            [Permission::ViewDashboard, Permission::ManageTickets].into_iter().collect();

        assert!(set.contains_any(&[Permission::ManageTickets]));
        assert!(set.contains_any(&[Permission::ManageUsers, Permission::ViewDashboard]));
        assert!(!set.contains_any(&[Permission::ManageUsers, Permission::ManageSettings]));
        assert!(!set.contains_any(&[]));
    }

    #[test]
    fn test_codes_are_sorted() {
        let set: PermissionSet =
            [Permission::ViewDashboard, Permission::ManageUsers].into_iter().collect();
        assert_eq!(set.codes(), vec!["manage_users", "view_dashboard"]);
    }
}
