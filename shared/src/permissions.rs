//! Role-based capability evaluation
//!
//! Each role maps to a fixed set of capability strings. Managers inherit the
//! team-lead set and admins inherit the manager set. Matching understands a
//! trailing `.*` wildcard on either side:
//!
//! - granted `users.*` satisfies a request for `users.create`
//! - a request for `warehouse.*` is satisfied by any granted `warehouse.…`
//!
//! Evaluation is pure and fails closed: no role, or a role string that does
//! not parse, never grants anything.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wildcard suffix recognised on capability strings
pub const WILDCARD_SUFFIX: &str = ".*";

/// Closed set of back-office roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    /// Team lead, restricted to the sites assigned to them
    Caposquadra,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Caposquadra];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Caposquadra => "caposquadra",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for role strings outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the canonical name in any case, optionally qualified as
    /// `UserRole.ADMIN` or `role.admin`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let bare = normalized
            .strip_prefix("userrole.")
            .or_else(|| normalized.strip_prefix("role."))
            .unwrap_or(&normalized);

        match bare {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "caposquadra" => Ok(Role::Caposquadra),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Capabilities every authenticated role holds
pub const BASE_CAPABILITIES: &[&str] = &[
    "dashboard.view",
    "fiches.view",
    "fiches.create",
    "notifications.view",
    "warehouse.view",
    "warehouse.requests.create",
    "warehouse.requests.view_own",
];

/// Added on top of the base set for managers
pub const MANAGER_CAPABILITIES: &[&str] = &[
    "sites.*",
    "machines.*",
    "personnel.*",
    "vehicles.*",
    "fiches.*",
    "inventory.manage",
    "inventory.categories",
    "warehouse.movements.view",
    "warehouse.requests.manage",
    "reports.*",
];

/// Added on top of the manager set for admins
pub const ADMIN_CAPABILITIES: &[&str] = &["users.*", "audit.view", "backup.*", "settings.*"];

/// Well-known capability names used by the API
pub mod caps {
    pub const DASHBOARD_VIEW: &str = "dashboard.view";
    pub const NOTIFICATIONS_VIEW: &str = "notifications.view";
    pub const WAREHOUSE_VIEW: &str = "warehouse.view";
    pub const REQUESTS_CREATE: &str = "warehouse.requests.create";
    pub const REQUESTS_VIEW_OWN: &str = "warehouse.requests.view_own";
    pub const REQUESTS_MANAGE: &str = "warehouse.requests.manage";
    pub const MOVEMENTS_VIEW: &str = "warehouse.movements.view";
    pub const INVENTORY_MANAGE: &str = "inventory.manage";
    pub const CATEGORIES_MANAGE: &str = "inventory.categories";
    pub const REPORTS_VIEW: &str = "reports.view";
    pub const REPORTS_EXPORT: &str = "reports.export";
    pub const AUDIT_VIEW: &str = "audit.view";
}

/// Full capability set for a role, inheritance applied
pub fn capabilities(role: Role) -> BTreeSet<&'static str> {
    let mut granted: BTreeSet<&'static str> = BASE_CAPABILITIES.iter().copied().collect();
    if matches!(role, Role::Manager | Role::Admin) {
        granted.extend(MANAGER_CAPABILITIES.iter().copied());
    }
    if role == Role::Admin {
        granted.extend(ADMIN_CAPABILITIES.iter().copied());
    }
    granted
}

/// Whether a single granted capability satisfies a requested one
pub fn capability_matches(granted: &str, requested: &str) -> bool {
    if granted == requested {
        return true;
    }

    if let Some(prefix) = granted.strip_suffix('*') {
        if granted.ends_with(WILDCARD_SUFFIX) && requested.starts_with(prefix) {
            return true;
        }
    }

    if let Some(prefix) = requested.strip_suffix('*') {
        if requested.ends_with(WILDCARD_SUFFIX) && granted.starts_with(prefix) {
            return true;
        }
    }

    false
}

/// Capability check for an already parsed role
pub fn has_capability(role: Option<Role>, capability: &str) -> bool {
    match role {
        Some(role) => capabilities(role)
            .iter()
            .any(|granted| capability_matches(granted, capability)),
        None => false,
    }
}

/// Capability check for a raw role string; unparseable roles get nothing
pub fn has_capability_str(role: Option<&str>, capability: &str) -> bool {
    has_capability(role.and_then(|r| r.parse().ok()), capability)
}
