//! Supply request workflow tests
//!
//! Covers the request state machine end to end against in-memory rows:
//! submission merging, approval pre-checks, partial and full fulfillment,
//! and the per-line `fulfilled <= requested` bound.

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::workflow::{ensure_items_requestable, merge_lines, status_for_lines};
use shared::{
    Item, LineInput, MovementKind, Priority, Request, RequestLine, RequestStatus, WarehouseError,
};
use uuid::Uuid;

fn item(code: &str, available: i64, threshold: Option<i64>) -> Item {
    Item {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: code.to_string(),
        description: None,
        category_id: None,
        unit: "pz".to_string(),
        available_quantity: Decimal::from(available),
        min_quantity: threshold.map(Decimal::from),
        is_active: true,
        is_favorite: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn pending_request(requester: Uuid) -> Request {
    Request {
        id: Uuid::new_v4(),
        requester_id: requester,
        site_id: None,
        priority: Priority::Medium,
        needed_by: None,
        note: None,
        status: RequestStatus::Pending,
        response: None,
        handled_by: None,
        handled_at: None,
        requester_read: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn lines_for(request: &Request, inputs: &[LineInput]) -> Vec<RequestLine> {
    inputs
        .iter()
        .map(|l| RequestLine {
            id: Uuid::new_v4(),
            request_id: request.id,
            item_id: l.item_id,
            requested_quantity: l.quantity,
            fulfilled_quantity: Decimal::ZERO,
        })
        .collect()
}

fn stock(items: &[&Item]) -> HashMap<Uuid, Item> {
    items.iter().map(|i| (i.id, (*i).clone())).collect()
}

fn input(item: &Item, qty: i64) -> LineInput {
    LineInput {
        item_id: item.id,
        quantity: Decimal::from(qty),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 12 requested against 10 available: submit passes, approve fails until
    /// the line is revised to 8, then a default fulfill empties it to 2.
    #[test]
    fn test_revise_then_approve_then_fulfill() {
        let requester = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let a = item("A", 10, Some(5));
        let mut items = stock(&[&a]);

        // submit does not look at stock
        let merged = merge_lines(&[input(&a, 12)]).unwrap();
        ensure_items_requestable(&merged, &items).unwrap();
        let mut request = pending_request(requester);
        let lines = lines_for(&request, &merged);

        let err = request
            .approve(&lines, &items, manager, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, WarehouseError::InsufficientStock { .. }));
        assert_eq!(request.status, RequestStatus::Pending);

        request.ensure_revisable().unwrap();
        let revised = merge_lines(&[input(&a, 8)]).unwrap();
        let mut lines = lines_for(&request, &revised);

        request
            .approve(&lines, &items, manager, Some("ok".to_string()), Utc::now())
            .unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.handled_by, Some(manager));
        assert_eq!(request.response.as_deref(), Some("ok"));

        let plan = request
            .plan_fulfillment(&lines, &HashMap::new(), &items)
            .unwrap();
        let applied = request.apply_fulfillment(&plan, &mut lines, &mut items, manager, Utc::now());

        assert_eq!(items[&a.id].available_quantity, Decimal::from(2));
        assert_eq!(lines[0].fulfilled_quantity, Decimal::from(8));
        assert_eq!(request.status, RequestStatus::Fulfilled);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].change.kind, MovementKind::Unload);
        assert!(a.crosses_threshold(&applied[0].change));
    }

    /// Override one line to zero: only the other line moves stock
    #[test]
    fn test_override_leaves_partial() {
        let manager = Uuid::new_v4();
        let a = item("A", 20, None);
        let b = item("B", 20, None);
        let mut items = stock(&[&a, &b]);

        let mut request = pending_request(Uuid::new_v4());
        let mut lines = lines_for(&request, &[input(&a, 5), input(&b, 3)]);
        request.approve(&lines, &items, manager, None, Utc::now()).unwrap();

        let overrides = HashMap::from([
            (lines[0].id, Decimal::from(5)),
            (lines[1].id, Decimal::ZERO),
        ]);
        let plan = request.plan_fulfillment(&lines, &overrides, &items).unwrap();
        let applied = request.apply_fulfillment(&plan, &mut lines, &mut items, manager, Utc::now());

        assert_eq!(request.status, RequestStatus::PartiallyFulfilled);
        assert_eq!(items[&a.id].available_quantity, Decimal::from(15));
        assert_eq!(items[&b.id].available_quantity, Decimal::from(20));
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].line_id, lines[0].id);

        // second round picks up the residual
        let plan = request
            .plan_fulfillment(&lines, &HashMap::new(), &items)
            .unwrap();
        request.apply_fulfillment(&plan, &mut lines, &mut items, manager, Utc::now());
        assert_eq!(request.status, RequestStatus::Fulfilled);
        assert_eq!(items[&b.id].available_quantity, Decimal::from(17));
    }

    #[test]
    fn test_same_item_on_two_lines_is_checked_cumulatively() {
        let a = item("A", 6, None);
        let items = stock(&[&a]);

        let mut request = pending_request(Uuid::new_v4());
        request.status = RequestStatus::Approved;
        let lines = lines_for(&request, &[input(&a, 4), input(&a, 4)]);

        let err = request
            .plan_fulfillment(&lines, &HashMap::new(), &items)
            .unwrap_err();
        assert!(matches!(
            err,
            WarehouseError::InsufficientStock { requested, .. } if requested == Decimal::from(8)
        ));
        assert_eq!(request.status, RequestStatus::Approved);
    }

    #[test]
    fn test_all_zero_overrides_is_nothing_to_fulfill() {
        let a = item("A", 6, None);
        let items = stock(&[&a]);
        let mut request = pending_request(Uuid::new_v4());
        request.status = RequestStatus::Approved;
        let lines = lines_for(&request, &[input(&a, 2)]);

        let overrides = HashMap::from([(lines[0].id, Decimal::ZERO)]);
        assert_eq!(
            request.plan_fulfillment(&lines, &overrides, &items),
            Err(WarehouseError::NothingToFulfill)
        );
    }

    #[test]
    fn test_override_above_residual_is_invalid() {
        let a = item("A", 60, None);
        let items = stock(&[&a]);
        let mut request = pending_request(Uuid::new_v4());
        request.status = RequestStatus::PartiallyFulfilled;
        let mut lines = lines_for(&request, &[input(&a, 10)]);
        lines[0].fulfilled_quantity = Decimal::from(7);

        let too_much = HashMap::from([(lines[0].id, Decimal::from(4))]);
        assert!(matches!(
            request.plan_fulfillment(&lines, &too_much, &items),
            Err(WarehouseError::InvalidQuantity { .. })
        ));

        let negative = HashMap::from([(lines[0].id, Decimal::from(-1))]);
        assert!(matches!(
            request.plan_fulfillment(&lines, &negative, &items),
            Err(WarehouseError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_lines_finer_than_a_thousandth_are_refused() {
        let a = item("A", 60, None);
        let tiny = LineInput {
            item_id: a.id,
            quantity: "0.0004".parse().unwrap(),
        };
        assert!(matches!(
            merge_lines(&[tiny]),
            Err(WarehouseError::InvalidQuantity { .. })
        ));

        let huge = LineInput {
            item_id: a.id,
            quantity: "123456789012345".parse().unwrap(),
        };
        assert!(matches!(
            merge_lines(&[huge]),
            Err(WarehouseError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_override_finer_than_a_thousandth_is_invalid() {
        let a = item("A", 60, None);
        let items = stock(&[&a]);
        let mut request = pending_request(Uuid::new_v4());
        request.status = RequestStatus::Approved;
        let lines = lines_for(&request, &[input(&a, 10)]);

        let tiny = HashMap::from([(lines[0].id, "0.0004".parse::<Decimal>().unwrap())]);
        assert!(matches!(
            request.plan_fulfillment(&lines, &tiny, &items),
            Err(WarehouseError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_unknown_line_override_is_not_found() {
        let a = item("A", 60, None);
        let items = stock(&[&a]);
        let mut request = pending_request(Uuid::new_v4());
        request.status = RequestStatus::Approved;
        let lines = lines_for(&request, &[input(&a, 10)]);

        let stray = HashMap::from([(Uuid::new_v4(), Decimal::ONE)]);
        assert_eq!(
            request.plan_fulfillment(&lines, &stray, &items),
            Err(WarehouseError::request_line_not_found())
        );
    }

    #[test]
    fn test_fulfill_requires_approval() {
        let a = item("A", 60, None);
        let items = stock(&[&a]);
        let request = pending_request(Uuid::new_v4());
        let lines = lines_for(&request, &[input(&a, 1)]);

        assert!(matches!(
            request.plan_fulfillment(&lines, &HashMap::new(), &items),
            Err(WarehouseError::InvalidTransition {
                from: RequestStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn test_terminal_states_refuse_transitions() {
        let manager = Uuid::new_v4();
        let mut rejected = pending_request(Uuid::new_v4());
        rejected.reject(manager, None, Utc::now()).unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert!(rejected.reject(manager, None, Utc::now()).is_err());
        assert!(rejected.approve(&[], &HashMap::new(), manager, None, Utc::now()).is_err());
        assert!(rejected.ensure_revisable().is_err());

        let mut approved = pending_request(Uuid::new_v4());
        approved.approve(&[], &HashMap::new(), manager, None, Utc::now()).unwrap();
        approved.reject(manager, Some("annullata".to_string()), Utc::now()).unwrap();
        assert_eq!(approved.status, RequestStatus::Rejected);

        let mut partial = pending_request(Uuid::new_v4());
        partial.status = RequestStatus::PartiallyFulfilled;
        assert!(partial.reject(manager, None, Utc::now()).is_err());
    }

    #[test]
    fn test_inactive_item_cannot_be_requested() {
        let mut a = item("A", 10, None);
        a.is_active = false;
        let items = stock(&[&a]);
        let lines = merge_lines(&[input(&a, 1)]).unwrap();
        assert_eq!(
            ensure_items_requestable(&lines, &items),
            Err(WarehouseError::ItemUnavailable { item_id: a.id })
        );

        let missing = LineInput {
            item_id: Uuid::new_v4(),
            quantity: Decimal::ONE,
        };
        assert!(ensure_items_requestable(&[missing], &items).is_err());
    }

    #[test]
    fn test_mark_read_only_for_requester_after_handling() {
        let requester = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let mut request = pending_request(requester);

        assert!(!request.mark_read(requester));

        request.reject(manager, None, Utc::now()).unwrap();
        assert!(!request.requester_read);
        assert!(!request.mark_read(manager));
        assert!(request.mark_read(requester));
        assert!(request.requester_read);
        assert!(!request.mark_read(requester));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn line_quantities() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(1i64..20, 1..5)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Random fulfillment rounds never overshoot a line, and the status
        /// always agrees with line progress
        #[test]
        fn prop_fulfillment_respects_lines(
            quantities in line_quantities(),
            rounds in prop::collection::vec(prop::collection::vec(0i64..25, 5), 1..6),
            available in 0i64..200,
        ) {
            let manager = Uuid::new_v4();
            let warehouse: Vec<Item> = quantities
                .iter()
                .enumerate()
                .map(|(i, _)| item(&format!("IT-{}", i), available, None))
                .collect();
            let mut items: HashMap<Uuid, Item> = warehouse.iter().map(|i| (i.id, i.clone())).collect();

            let mut request = pending_request(Uuid::new_v4());
            request.status = RequestStatus::Approved;
            let inputs: Vec<LineInput> = warehouse
                .iter()
                .zip(&quantities)
                .map(|(it, q)| input(it, *q))
                .collect();
            let mut lines = lines_for(&request, &inputs);

            for round in &rounds {
                let overrides: HashMap<Uuid, Decimal> = lines
                    .iter()
                    .zip(round)
                    .map(|(l, q)| (l.id, Decimal::from(*q)))
                    .collect();
                let before_items = items.clone();
                let before_lines = lines.clone();
                let before_status = request.status;

                match request.plan_fulfillment(&lines, &overrides, &items) {
                    Ok(plan) => {
                        request.apply_fulfillment(&plan, &mut lines, &mut items, manager, Utc::now());
                    }
                    Err(_) => {
                        prop_assert_eq!(&items, &before_items);
                        prop_assert_eq!(&lines, &before_lines);
                        prop_assert_eq!(request.status, before_status);
                    }
                }

                let requested: Decimal = lines.iter().map(|l| l.requested_quantity).sum();
                let fulfilled: Decimal = lines.iter().map(|l| l.fulfilled_quantity).sum();
                prop_assert!(fulfilled <= requested);
                for line in &lines {
                    prop_assert!(line.fulfilled_quantity >= Decimal::ZERO);
                    prop_assert!(line.fulfilled_quantity <= line.requested_quantity);
                }
                for it in items.values() {
                    prop_assert!(it.available_quantity >= Decimal::ZERO);
                }

                match request.status {
                    RequestStatus::Fulfilled => {
                        prop_assert!(lines.iter().all(|l| l.fulfilled_quantity == l.requested_quantity));
                    }
                    RequestStatus::PartiallyFulfilled => {
                        prop_assert!(fulfilled > Decimal::ZERO && fulfilled < requested);
                    }
                    RequestStatus::Approved => {
                        prop_assert_eq!(fulfilled, Decimal::ZERO);
                    }
                    other => {
                        prop_assert!(false, "unexpected status {}", other);
                    }
                }
            }
        }

        /// Stock taken from items equals the quantity added to lines
        #[test]
        fn prop_stock_moves_match_lines(
            quantities in line_quantities(),
            available in 0i64..100,
        ) {
            let manager = Uuid::new_v4();
            let shared_item = item("SHARED", available, None);
            let mut items = stock(&[&shared_item]);
            let mut request = pending_request(Uuid::new_v4());
            request.status = RequestStatus::Approved;
            let inputs: Vec<LineInput> = quantities.iter().map(|q| input(&shared_item, *q)).collect();
            let mut lines = lines_for(&request, &inputs);

            let total: i64 = quantities.iter().sum();
            let result = request.plan_fulfillment(&lines, &HashMap::new(), &items);
            prop_assert_eq!(result.is_ok(), total <= available);

            if let Ok(plan) = result {
                let applied = request.apply_fulfillment(&plan, &mut lines, &mut items, manager, Utc::now());
                let moved: Decimal = applied.iter().map(|a| a.change.quantity).sum();
                prop_assert_eq!(moved, Decimal::from(total));
                prop_assert_eq!(
                    items[&shared_item.id].available_quantity,
                    Decimal::from(available - total)
                );
                prop_assert_eq!(status_for_lines(&lines), Some(RequestStatus::Fulfilled));
            }
        }

        /// Merging keeps one line per item and preserves the total
        #[test]
        fn prop_merge_preserves_totals(picks in prop::collection::vec((0usize..4, 1i64..10), 1..12)) {
            let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
            let raw: Vec<LineInput> = picks
                .iter()
                .map(|(i, q)| LineInput { item_id: ids[*i], quantity: Decimal::from(*q) })
                .collect();

            let merged = merge_lines(&raw).unwrap();
            let raw_total: Decimal = raw.iter().map(|l| l.quantity).sum();
            let merged_total: Decimal = merged.iter().map(|l| l.quantity).sum();
            prop_assert_eq!(raw_total, merged_total);

            let mut seen = std::collections::HashSet::new();
            prop_assert!(merged.iter().all(|l| seen.insert(l.item_id)));
        }
    }
}
