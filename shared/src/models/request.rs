//! Warehouse supply request models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a supply request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "request_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    PartiallyFulfilled,
    Fulfilled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::PartiallyFulfilled => "partially_fulfilled",
            RequestStatus::Fulfilled => "fulfilled",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency chosen by the requester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "request_priority", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A team lead's request for warehouse items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Request {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub site_id: Option<Uuid>,
    pub priority: Priority,
    pub needed_by: Option<NaiveDate>,
    pub note: Option<String>,
    pub status: RequestStatus,
    pub response: Option<String>,
    pub handled_by: Option<Uuid>,
    pub handled_at: Option<DateTime<Utc>>,
    /// Reset whenever the status changes
    pub requester_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-item breakdown of a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RequestLine {
    pub id: Uuid,
    pub request_id: Uuid,
    pub item_id: Uuid,
    pub requested_quantity: Decimal,
    /// Monotonically increasing, never above `requested_quantity`
    pub fulfilled_quantity: Decimal,
}

impl RequestLine {
    /// Quantity still owed on this line
    pub fn residual(&self) -> Decimal {
        self.requested_quantity - self.fulfilled_quantity
    }

    pub fn is_complete(&self) -> bool {
        self.fulfilled_quantity >= self.requested_quantity
    }
}

/// Request line joined with item details for display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RequestLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub unit: String,
    pub requested_quantity: Decimal,
    pub fulfilled_quantity: Decimal,
    pub available_quantity: Decimal,
}

/// A request together with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestWithLines {
    #[serde(flatten)]
    pub request: Request,
    pub lines: Vec<RequestLineView>,
}

/// One (item, quantity) pair as submitted on the request form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
}
