//! Stock ledger arithmetic
//!
//! Planning functions validate a quantity change against the current item
//! state and return the movement to record plus the resulting availability.
//! They never mutate; [`Item::apply`] applies an accepted change. Callers
//! persist both the new quantity and the movement in one transaction.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{Item, MovementKind};

/// Decimal places kept by every stored quantity
pub const QUANTITY_SCALE: u32 = 3;

/// Largest quantity a `NUMERIC(14, 3)` column holds
pub fn max_quantity() -> Decimal {
    Decimal::new(99_999_999_999_999, QUANTITY_SCALE)
}

/// Fail with `InvalidQuantity` unless `quantity` is stored without rounding
///
/// Trailing zeros do not count towards the scale, so `1.5000` is accepted.
pub fn ensure_storable(field: &str, quantity: Decimal) -> WarehouseResult<()> {
    if quantity.normalize().scale() > QUANTITY_SCALE {
        return Err(WarehouseError::invalid_quantity(
            field,
            "at most 3 decimal places",
        ));
    }
    if quantity.abs() > max_quantity() {
        return Err(WarehouseError::invalid_quantity(field, "is too large"));
    }
    Ok(())
}

/// An accepted quantity change for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub kind: MovementKind,
    /// Positive amount recorded on the movement
    pub quantity: Decimal,
    /// Availability after the change
    pub new_available: Decimal,
}

/// Validate a load of `quantity` into `available`
pub fn plan_load(available: Decimal, quantity: Decimal) -> WarehouseResult<StockChange> {
    if quantity <= Decimal::ZERO {
        return Err(WarehouseError::invalid_quantity(
            "quantity",
            "must be greater than zero",
        ));
    }
    ensure_storable("quantity", quantity)?;

    let new_available = available + quantity;
    if new_available > max_quantity() {
        return Err(WarehouseError::invalid_quantity(
            "quantity",
            "would exceed the largest storable availability",
        ));
    }

    Ok(StockChange {
        kind: MovementKind::Load,
        quantity,
        new_available,
    })
}

/// Validate an unload of `quantity` from `item`
pub fn plan_unload(item: &Item, quantity: Decimal) -> WarehouseResult<StockChange> {
    if quantity <= Decimal::ZERO {
        return Err(WarehouseError::invalid_quantity(
            "quantity",
            "must be greater than zero",
        ));
    }
    ensure_storable("quantity", quantity)?;

    ensure_available(item, quantity)?;

    Ok(StockChange {
        kind: MovementKind::Unload,
        quantity,
        new_available: item.available_quantity - quantity,
    })
}

/// Validate setting availability directly; `None` when nothing changes
pub fn plan_adjust(available: Decimal, new_quantity: Decimal) -> WarehouseResult<Option<StockChange>> {
    if new_quantity < Decimal::ZERO {
        return Err(WarehouseError::invalid_quantity(
            "new_quantity",
            "cannot be negative",
        ));
    }
    ensure_storable("new_quantity", new_quantity)?;

    let delta = new_quantity - available;
    if delta.is_zero() {
        return Ok(None);
    }

    let kind = if delta > Decimal::ZERO {
        MovementKind::Load
    } else {
        MovementKind::Unload
    };

    Ok(Some(StockChange {
        kind,
        quantity: delta.abs(),
        new_available: new_quantity,
    }))
}

/// Fail with `InsufficientStock` when `item` cannot cover `requested`
pub fn ensure_available(item: &Item, requested: Decimal) -> WarehouseResult<()> {
    if requested > item.available_quantity {
        return Err(WarehouseError::InsufficientStock {
            item_id: item.id,
            code: item.code.clone(),
            requested,
            available: item.available_quantity,
        });
    }
    Ok(())
}

impl Item {
    /// Apply a change previously accepted by one of the planners
    pub fn apply(&mut self, change: &StockChange) {
        self.available_quantity = change.new_available;
    }

    /// True when `change` takes this item from above its threshold to at or below it
    pub fn crosses_threshold(&self, change: &StockChange) -> bool {
        change.kind == MovementKind::Unload
            && !self.is_low_stock()
            && crate::models::is_low_stock(change.new_available, self.min_quantity)
    }
}
