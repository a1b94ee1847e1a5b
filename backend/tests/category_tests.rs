//! Category registry tests
//!
//! Slug derivation, case-insensitive duplicates, and the reorder round-trip
//! law over active categories.

use chrono::Utc;
use proptest::prelude::*;
use shared::categories::{
    apply_reorder, ensure_unique_name, listing, next_display_order, plan_reorder, slug_for,
    slugify, sorted_active, FALLBACK_SLUG, UNCATEGORIZED_SLUG,
};
use shared::{Category, ReorderDirection, WarehouseError};
use uuid::Uuid;

fn category(name: &str, order: i32, active: bool) -> Category {
    Category {
        id: Uuid::new_v4(),
        name: name.to_string(),
        slug: slugify(name),
        display_order: order,
        is_active: active,
        icon: None,
        color: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn active_order(categories: &[Category]) -> Vec<Uuid> {
    sorted_active(categories).iter().map(|c| c.id).collect()
}

fn reorder(categories: &mut [Category], id: Uuid, direction: ReorderDirection) -> bool {
    match plan_reorder(categories, id, direction) {
        Some(plan) => {
            apply_reorder(categories, &plan.assignments);
            true
        }
        None => false,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_case_variant_is_duplicate() {
        let mut existing = vec![category("Elettrico", 0, true)];
        ensure_unique_name(&existing, "Idraulica", None).unwrap();
        existing.push(category("Idraulica", 1, true));

        assert_eq!(
            ensure_unique_name(&existing, "idraulica", None),
            Err(WarehouseError::DuplicateName("idraulica".to_string()))
        );
    }

    #[test]
    fn test_inactive_names_still_count() {
        let existing = vec![category("Vecchia", 0, false)];
        assert!(ensure_unique_name(&existing, "VECCHIA", None).is_err());
    }

    #[test]
    fn test_slug_collisions_count_up() {
        let mut existing = vec![category("Viti e bulloni", 0, true)];
        let second = slug_for(&existing, "Viti & bulloni", None);
        assert_eq!(second, "viti-bulloni-2");

        let mut c = category("Viti & bulloni", 1, true);
        c.slug = second;
        existing.push(c);
        assert_eq!(slug_for(&existing, "Viti - bulloni", None), "viti-bulloni-3");
    }

    #[test]
    fn test_symbol_only_name_gets_fallback_slug() {
        assert_eq!(slugify("***"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
    }

    #[test]
    fn test_new_category_goes_last() {
        let existing = vec![category("A", 0, true), category("B", 4, true)];
        assert_eq!(next_display_order(&existing), 5);
    }

    #[test]
    fn test_ties_broken_by_name() {
        let cats = vec![
            category("Zinco", 1, true),
            category("Acciaio", 1, true),
            category("Rame", 0, true),
        ];
        let names: Vec<_> = sorted_active(&cats).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Rame", "Acciaio", "Zinco"]);
    }

    #[test]
    fn test_up_then_down_restores_order() {
        let mut cats = vec![
            category("A", 0, true),
            category("B", 1, true),
            category("C", 2, true),
        ];
        let original = active_order(&cats);
        let c = cats[2].id;

        assert!(reorder(&mut cats, c, ReorderDirection::Up));
        assert_ne!(active_order(&cats), original);
        assert!(reorder(&mut cats, c, ReorderDirection::Down));
        assert_eq!(active_order(&cats), original);
    }

    #[test]
    fn test_first_up_is_noop() {
        let mut cats = vec![category("A", 0, true), category("B", 1, true)];
        let original = active_order(&cats);
        let a = cats[0].id;
        assert!(!reorder(&mut cats, a, ReorderDirection::Up));
        assert_eq!(active_order(&cats), original);
    }

    #[test]
    fn test_listing_ends_with_uncategorized() {
        let cats = vec![category("A", 0, true)];
        let views = listing(&cats, true);
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].slug, UNCATEGORIZED_SLUG);
        assert!(views[1].id.is_none());
        assert!(views[1].display_order > views[0].display_order);

        assert_eq!(listing(&cats, false).len(), 1);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn categories_strategy() -> impl Strategy<Value = Vec<Category>> {
        prop::collection::vec((0i32..6, any::<bool>()), 1..8).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (order, active))| category(&format!("Cat {}", i), order, active))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        /// Slugs are lowercase ASCII alphanumerics joined by single hyphens
        #[test]
        fn prop_slug_shape(name in "\\PC{0,40}") {
            let slug = slugify(&name);
            prop_assert!(!slug.is_empty());
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        /// Up then down (or down then up) restores the active order unless
        /// the first call hit a boundary
        #[test]
        fn prop_reorder_round_trip(
            mut cats in categories_strategy(),
            pick in any::<prop::sample::Index>(),
            up_first in any::<bool>(),
        ) {
            let target = cats[pick.index(cats.len())].id;
            let original = active_order(&cats);
            let (first, second) = if up_first {
                (ReorderDirection::Up, ReorderDirection::Down)
            } else {
                (ReorderDirection::Down, ReorderDirection::Up)
            };

            if reorder(&mut cats, target, first) {
                prop_assert!(reorder(&mut cats, target, second));
                prop_assert_eq!(active_order(&cats), original);
            } else {
                prop_assert_eq!(active_order(&cats), original);
            }
        }

        /// A swap moves the target exactly one slot
        #[test]
        fn prop_reorder_moves_one_slot(
            mut cats in categories_strategy(),
            pick in any::<prop::sample::Index>(),
        ) {
            let target = cats[pick.index(cats.len())].id;
            let before = active_order(&cats);
            if reorder(&mut cats, target, ReorderDirection::Down) {
                let after = active_order(&cats);
                let old = before.iter().position(|id| *id == target).unwrap();
                let new = after.iter().position(|id| *id == target).unwrap();
                prop_assert_eq!(new, old + 1);
                prop_assert_eq!(before.len(), after.len());
            }
        }
    }
}
