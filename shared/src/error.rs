//! Typed business-rule failures for the warehouse core
//!
//! Every operation in the ledger, category registry and request workflow
//! reports rule violations through [`WarehouseError`]. Infrastructure failures
//! never appear here; the backend wraps those separately.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::RequestStatus;

/// Business-rule violations raised by warehouse operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarehouseError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("Invalid quantity for {field}: {reason}")]
    InvalidQuantity { field: String, reason: String },

    #[error("Insufficient stock for item {code}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: Uuid,
        code: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("A category named '{0}' already exists")]
    DuplicateName(String),

    #[error("An item with code '{0}' already exists")]
    DuplicateCode(String),

    #[error("The request contains no valid lines")]
    NoValidLines,

    #[error("Nothing to fulfill: every selected quantity is zero")]
    NothingToFulfill,

    #[error("Item {item_id} is missing or inactive")]
    ItemUnavailable { item_id: Uuid },

    #[error("Cannot {action} a request in state {from}")]
    InvalidTransition {
        from: RequestStatus,
        action: &'static str,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}

impl WarehouseError {
    pub fn item_not_found() -> Self {
        Self::NotFound { entity: "Item" }
    }

    pub fn request_not_found() -> Self {
        Self::NotFound { entity: "Request" }
    }

    pub fn request_line_not_found() -> Self {
        Self::NotFound { entity: "Request line" }
    }

    pub fn category_not_found() -> Self {
        Self::NotFound { entity: "Category" }
    }

    pub fn invalid_quantity(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field name the originating form should highlight, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidQuantity { field, .. } | Self::InvalidInput { field, .. } => Some(field),
            Self::DuplicateName(_) => Some("name"),
            Self::DuplicateCode(_) => Some("code"),
            Self::NoValidLines | Self::ItemUnavailable { .. } => Some("lines"),
            _ => None,
        }
    }
}

/// Result alias for warehouse rules
pub type WarehouseResult<T> = Result<T, WarehouseError>;
