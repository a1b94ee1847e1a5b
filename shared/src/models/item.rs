//! Warehouse item models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default unit of measure for new items ("pezzi")
pub const DEFAULT_UNIT: &str = "pz";

/// A stock-keeping item held in the warehouse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    pub id: Uuid,
    /// Human-entered unique code (e.g. "CAV-016")
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit: String,
    /// Never negative; every change is paired with a movement
    pub available_quantity: Decimal,
    /// Low-stock threshold
    pub min_quantity: Option<Decimal>,
    pub is_active: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// True when a threshold is set and availability has reached it
    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.available_quantity, self.min_quantity)
    }
}

/// Low-stock rule shared by item views and notifications
pub fn is_low_stock(available: Decimal, threshold: Option<Decimal>) -> bool {
    matches!(threshold, Some(min) if available <= min)
}

/// Item row joined with its category for listings and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemSummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub available_quantity: Decimal,
    pub min_quantity: Option<Decimal>,
    pub is_active: bool,
    pub is_favorite: bool,
}

impl ItemSummary {
    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.available_quantity, self.min_quantity)
    }
}
