//! Input validation helpers for the warehouse back office
//!
//! Form-level rules shared by every entry point. Each returns a static message
//! the backend maps onto the offending field.

use rust_decimal::Decimal;

use crate::stock::ensure_storable;

/// Maximum length of an item code
pub const MAX_ITEM_CODE_LEN: usize = 32;

// ============================================================================
// Item Validations
// ============================================================================

/// Canonical form of a human-entered item code (trimmed, uppercase)
pub fn normalize_item_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Validate item code format (1-32 chars: A-Z, 0-9, '-', '_', '.', '/')
pub fn validate_item_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Item code cannot be empty");
    }
    if code.len() > MAX_ITEM_CODE_LEN {
        return Err("Item code must be at most 32 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || "-_./".contains(c))
    {
        return Err("Item code may only contain letters, digits and - _ . /");
    }
    Ok(())
}

/// Validate an optional low-stock threshold
pub fn validate_threshold(threshold: Option<Decimal>) -> Result<(), &'static str> {
    match threshold {
        Some(t) if t < Decimal::ZERO => Err("Minimum quantity cannot be negative"),
        Some(t) if ensure_storable("min_quantity", t).is_err() => {
            Err("Minimum quantity must fit 3 decimal places and 11 integer digits")
        }
        _ => Ok(()),
    }
}

/// Validate an initial stock quantity
pub fn validate_initial_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Initial quantity cannot be negative");
    }
    if ensure_storable("initial_quantity", quantity).is_err() {
        return Err("Initial quantity must fit 3 decimal places and 11 integer digits");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Trim free text; blank becomes `None`
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
