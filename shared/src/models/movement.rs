//! Stock movement ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement
///
/// Adjustments are recorded as a load or an unload depending on the sign of
/// the correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "movement_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Load,
    Unload,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Load => "load",
            MovementKind::Unload => "unload",
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry recording one quantity change of an item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Movement {
    pub id: Uuid,
    pub item_id: Uuid,
    pub kind: MovementKind,
    /// Always positive
    pub quantity: Decimal,
    pub site_id: Option<Uuid>,
    pub request_line_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Movement joined with item, site and actor names for history views
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MovementView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub site_id: Option<Uuid>,
    pub site_name: Option<String>,
    pub request_line_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
