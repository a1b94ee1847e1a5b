//! User account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::Role;

/// A back-office user account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Stored as text; parse with [`User::parsed_role`] before any decision
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Role parsed into the closed enumeration, `None` when unrecognised
    pub fn parsed_role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}
