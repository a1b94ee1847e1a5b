//! In-app notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::Role;

/// Kinds of notices raised by the warehouse workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RequestSubmitted,
    RequestApproved,
    RequestRejected,
    RequestFulfilled,
    RequestPartiallyFulfilled,
    LowStock,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RequestSubmitted => "request_submitted",
            NotificationKind::RequestApproved => "request_approved",
            NotificationKind::RequestRejected => "request_rejected",
            NotificationKind::RequestFulfilled => "request_fulfilled",
            NotificationKind::RequestPartiallyFulfilled => "request_partially_fulfilled",
            NotificationKind::LowStock => "low_stock",
        }
    }
}

/// Who a notice is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    User(Uuid),
    Role(Role),
    /// Every active user whose role grants the capability
    Capability(String),
}

/// A stored notice for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
