//! Supply request state machine
//!
//! ```text
//! pending ──approve──▶ approved ──fulfill──▶ partially_fulfilled ──fulfill──▶ fulfilled
//!    │                    │   └──────────────fulfill──────────────────────────▲
//!    └──reject──▶ rejected ◀──reject──┘
//! ```
//!
//! Rejected and fulfilled are terminal and no request ever returns to
//! pending. Stock checks here are pre-checks against the availability the
//! caller loaded; nothing is reserved.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{Item, LineInput, MovementKind, Request, RequestLine, RequestStatus};
use crate::stock::{ensure_available, ensure_storable, StockChange};

/// Merge submitted lines by item, summing quantities, first occurrence order kept
pub fn merge_lines(lines: &[LineInput]) -> WarehouseResult<Vec<LineInput>> {
    let mut merged: Vec<LineInput> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.item_id == line.item_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(*line),
        }
    }

    if merged.is_empty() {
        return Err(WarehouseError::NoValidLines);
    }

    if let Some(bad) = merged.iter().find(|l| l.quantity <= Decimal::ZERO) {
        return Err(WarehouseError::invalid_quantity(
            format!("lines.{}", bad.item_id),
            "must be greater than zero",
        ));
    }
    for line in &merged {
        ensure_storable(&format!("lines.{}", line.item_id), line.quantity)?;
    }

    Ok(merged)
}

/// Every referenced item must exist and be active
pub fn ensure_items_requestable(
    lines: &[LineInput],
    items: &HashMap<Uuid, Item>,
) -> WarehouseResult<()> {
    for line in lines {
        match items.get(&line.item_id) {
            Some(item) if item.is_active => {}
            _ => return Err(WarehouseError::ItemUnavailable { item_id: line.item_id }),
        }
    }
    Ok(())
}

/// Status implied by line progress; `None` while nothing has been fulfilled
pub fn status_for_lines(lines: &[RequestLine]) -> Option<RequestStatus> {
    if !lines.is_empty() && lines.iter().all(RequestLine::is_complete) {
        Some(RequestStatus::Fulfilled)
    } else if lines.iter().any(|l| l.fulfilled_quantity > Decimal::ZERO) {
        Some(RequestStatus::PartiallyFulfilled)
    } else {
        None
    }
}

/// Quantity taken from one line in a fulfillment batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineAllocation {
    pub line_id: Uuid,
    pub item_id: Uuid,
    pub quantity: Decimal,
}

/// A validated fulfillment batch, ready to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfillmentPlan {
    /// Only lines with a positive amount
    pub allocations: Vec<LineAllocation>,
    pub resulting_status: RequestStatus,
}

/// Stock change produced for one allocation when a plan is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedAllocation {
    pub line_id: Uuid,
    pub item_id: Uuid,
    pub change: StockChange,
}

impl Request {
    fn ensure_status(&self, allowed: &[RequestStatus], action: &'static str) -> WarehouseResult<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(WarehouseError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }

    /// Lines may only be revised before anyone handled the request
    pub fn ensure_revisable(&self) -> WarehouseResult<()> {
        self.ensure_status(&[RequestStatus::Pending], "revise")
    }

    fn transition(&mut self, status: RequestStatus, handler: Uuid, now: DateTime<Utc>) {
        self.status = status;
        self.handled_by = Some(handler);
        self.handled_at = Some(now);
        self.requester_read = false;
        self.updated_at = now;
    }

    /// Approve a pending request if current stock covers every line
    pub fn approve(
        &mut self,
        lines: &[RequestLine],
        items: &HashMap<Uuid, Item>,
        handler: Uuid,
        response: Option<String>,
        now: DateTime<Utc>,
    ) -> WarehouseResult<()> {
        self.ensure_status(&[RequestStatus::Pending], "approve")?;

        for line in lines {
            let item = items
                .get(&line.item_id)
                .ok_or_else(WarehouseError::item_not_found)?;
            ensure_available(item, line.requested_quantity)?;
        }

        self.response = response;
        self.transition(RequestStatus::Approved, handler, now);
        Ok(())
    }

    /// Reject a pending or approved request
    pub fn reject(
        &mut self,
        handler: Uuid,
        response: Option<String>,
        now: DateTime<Utc>,
    ) -> WarehouseResult<()> {
        self.ensure_status(&[RequestStatus::Pending, RequestStatus::Approved], "reject")?;
        self.response = response;
        self.transition(RequestStatus::Rejected, handler, now);
        Ok(())
    }

    /// Requester acknowledges a handled request; returns whether anything changed
    pub fn mark_read(&mut self, reader: Uuid) -> bool {
        if reader != self.requester_id || self.handled_at.is_none() || self.requester_read {
            return false;
        }
        self.requester_read = true;
        true
    }

    /// Validate a fulfillment batch without touching any state
    ///
    /// Each line defaults to its full residual unless `overrides` carries an
    /// explicit amount for its id. Amounts are summed per item before the
    /// availability check so two lines cannot each pass on the same stock.
    pub fn plan_fulfillment(
        &self,
        lines: &[RequestLine],
        overrides: &HashMap<Uuid, Decimal>,
        items: &HashMap<Uuid, Item>,
    ) -> WarehouseResult<FulfillmentPlan> {
        self.ensure_status(
            &[RequestStatus::Approved, RequestStatus::PartiallyFulfilled],
            "fulfill",
        )?;

        if overrides.keys().any(|id| !lines.iter().any(|l| l.id == *id)) {
            return Err(WarehouseError::request_line_not_found());
        }

        let mut allocations = Vec::new();
        for line in lines {
            let residual = line.residual();
            let amount = overrides.get(&line.id).copied().unwrap_or(residual);
            ensure_storable(&format!("lines.{}", line.id), amount)?;
            if amount < Decimal::ZERO || amount > residual {
                return Err(WarehouseError::invalid_quantity(
                    format!("lines.{}", line.id),
                    format!("must be between 0 and {}", residual),
                ));
            }
            if amount > Decimal::ZERO {
                allocations.push(LineAllocation {
                    line_id: line.id,
                    item_id: line.item_id,
                    quantity: amount,
                });
            }
        }

        if allocations.is_empty() {
            return Err(WarehouseError::NothingToFulfill);
        }

        let mut per_item: Vec<(Uuid, Decimal)> = Vec::new();
        for allocation in &allocations {
            match per_item.iter_mut().find(|(id, _)| *id == allocation.item_id) {
                Some((_, total)) => *total += allocation.quantity,
                None => per_item.push((allocation.item_id, allocation.quantity)),
            }
        }
        for (item_id, total) in &per_item {
            let item = items.get(item_id).ok_or_else(WarehouseError::item_not_found)?;
            ensure_available(item, *total)?;
        }

        let all_complete = lines.iter().all(|line| {
            let taken = allocations
                .iter()
                .find(|a| a.line_id == line.id)
                .map(|a| a.quantity)
                .unwrap_or(Decimal::ZERO);
            line.fulfilled_quantity + taken >= line.requested_quantity
        });

        Ok(FulfillmentPlan {
            allocations,
            resulting_status: if all_complete {
                RequestStatus::Fulfilled
            } else {
                RequestStatus::PartiallyFulfilled
            },
        })
    }

    /// Apply a plan from [`Request::plan_fulfillment`] to in-memory state
    ///
    /// The plan must have been produced against the same `lines` and `items`;
    /// no check is repeated here.
    pub fn apply_fulfillment(
        &mut self,
        plan: &FulfillmentPlan,
        lines: &mut [RequestLine],
        items: &mut HashMap<Uuid, Item>,
        handler: Uuid,
        now: DateTime<Utc>,
    ) -> Vec<AppliedAllocation> {
        let mut applied = Vec::with_capacity(plan.allocations.len());

        for allocation in &plan.allocations {
            if let Some(line) = lines.iter_mut().find(|l| l.id == allocation.line_id) {
                line.fulfilled_quantity += allocation.quantity;
            }
            if let Some(item) = items.get_mut(&allocation.item_id) {
                let change = StockChange {
                    kind: MovementKind::Unload,
                    quantity: allocation.quantity,
                    new_available: item.available_quantity - allocation.quantity,
                };
                item.apply(&change);
                applied.push(AppliedAllocation {
                    line_id: allocation.line_id,
                    item_id: allocation.item_id,
                    change,
                });
            }
        }

        let status = status_for_lines(lines).unwrap_or(plan.resulting_status);
        self.transition(status, handler, now);
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item_id: Uuid, qty: i64) -> LineInput {
        LineInput {
            item_id,
            quantity: Decimal::from(qty),
        }
    }

    #[test]
    fn merge_sums_duplicates_in_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_lines(&[line(a, 2), line(b, 1), line(a, 3)]).unwrap();
        assert_eq!(merged, vec![line(a, 5), line(b, 1)]);
    }

    #[test]
    fn merge_rejects_empty_input() {
        assert_eq!(merge_lines(&[]), Err(WarehouseError::NoValidLines));
    }

    #[test]
    fn merge_rejects_non_positive_totals() {
        let a = Uuid::new_v4();
        assert!(matches!(
            merge_lines(&[line(a, 2), line(a, -2)]),
            Err(WarehouseError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn status_for_lines_reports_progress() {
        let request_id = Uuid::new_v4();
        let mut lines = vec![
            RequestLine {
                id: Uuid::new_v4(),
                request_id,
                item_id: Uuid::new_v4(),
                requested_quantity: Decimal::from(5),
                fulfilled_quantity: Decimal::ZERO,
            },
            RequestLine {
                id: Uuid::new_v4(),
                request_id,
                item_id: Uuid::new_v4(),
                requested_quantity: Decimal::from(3),
                fulfilled_quantity: Decimal::ZERO,
            },
        ];
        assert_eq!(status_for_lines(&lines), None);

        lines[0].fulfilled_quantity = Decimal::from(5);
        assert_eq!(status_for_lines(&lines), Some(RequestStatus::PartiallyFulfilled));

        lines[1].fulfilled_quantity = Decimal::from(3);
        assert_eq!(status_for_lines(&lines), Some(RequestStatus::Fulfilled));
    }
}
