//! Category registry rules: slugs, duplicate names, ordering and item buckets

use uuid::Uuid;

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{Category, CategoryColor, CategoryView, ReorderDirection};

/// Slug used when a name has no alphanumeric characters at all
pub const FALLBACK_SLUG: &str = "categoria";

/// Slug of the synthetic bucket for items without a usable category
pub const UNCATEGORIZED_SLUG: &str = "senza-categoria";

/// Display name of the synthetic bucket
pub const UNCATEGORIZED_NAME: &str = "Senza categoria";

/// URL-safe slug: lowercase, non-alphanumeric runs become one hyphen
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// First of `base`, `base-2`, `base-3`, … for which `taken` is false
pub fn unique_slug(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// Trimmed, non-empty category name
pub fn normalize_name(name: &str) -> WarehouseResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WarehouseError::InvalidInput {
            field: "name".to_string(),
            reason: "cannot be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Canonical palette key, or an error for colors outside the palette
pub fn normalize_color(color: Option<&str>) -> WarehouseResult<Option<String>> {
    match color.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(value) => CategoryColor::parse(value)
            .map(|c| Some(c.as_str().to_string()))
            .ok_or_else(|| WarehouseError::InvalidInput {
                field: "color".to_string(),
                reason: format!("'{}' is not a palette color", value),
            }),
    }
}

/// Case-insensitive duplicate check, ignoring `exclude`
pub fn ensure_unique_name(
    existing: &[Category],
    name: &str,
    exclude: Option<Uuid>,
) -> WarehouseResult<()> {
    let lowered = name.to_lowercase();
    let clash = existing
        .iter()
        .filter(|c| Some(c.id) != exclude)
        .any(|c| c.name.to_lowercase() == lowered);

    if clash {
        Err(WarehouseError::DuplicateName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Unique slug for `name` against `existing`, ignoring `exclude`
pub fn slug_for(existing: &[Category], name: &str, exclude: Option<Uuid>) -> String {
    unique_slug(&slugify(name), |candidate| {
        existing
            .iter()
            .any(|c| Some(c.id) != exclude && c.slug == candidate)
    })
}

/// Order value placing a new category after every active one
pub fn next_display_order(existing: &[Category]) -> i32 {
    existing
        .iter()
        .filter(|c| c.is_active)
        .map(|c| c.display_order)
        .max()
        .map_or(0, |max| max + 1)
}

/// Active categories in display order, ties broken by name
pub fn sorted_active(categories: &[Category]) -> Vec<&Category> {
    let mut active: Vec<&Category> = categories.iter().filter(|c| c.is_active).collect();
    active.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
    });
    active
}

/// New order value for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAssignment {
    pub id: Uuid,
    pub display_order: i32,
}

/// Writes needed to move a category one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// Category the target traded places with
    pub neighbour: Uuid,
    pub assignments: Vec<OrderAssignment>,
}

/// Plan moving `target` one slot; `None` at a boundary or when inactive
///
/// With distinct order values the two categories simply trade values. When
/// active categories share a value, a swap could leave the target in place or
/// jump it past a tie, so every active category is renumbered `0..n` in the
/// new order instead.
pub fn plan_reorder(
    categories: &[Category],
    target: Uuid,
    direction: ReorderDirection,
) -> Option<ReorderPlan> {
    let mut active = sorted_active(categories);
    let position = active.iter().position(|c| c.id == target)?;

    let neighbour_position = match direction {
        ReorderDirection::Up => position.checked_sub(1)?,
        ReorderDirection::Down => {
            let next = position + 1;
            if next >= active.len() {
                return None;
            }
            next
        }
    };

    let current = active[position];
    let neighbour = active[neighbour_position];

    let has_ties = active
        .windows(2)
        .any(|pair| pair[0].display_order == pair[1].display_order);

    let assignments = if has_ties {
        active.swap(position, neighbour_position);
        active
            .iter()
            .enumerate()
            .filter_map(|(index, c)| {
                let order = i32::try_from(index).ok()?;
                (c.display_order != order).then_some(OrderAssignment {
                    id: c.id,
                    display_order: order,
                })
            })
            .collect()
    } else {
        vec![
            OrderAssignment {
                id: current.id,
                display_order: neighbour.display_order,
            },
            OrderAssignment {
                id: neighbour.id,
                display_order: current.display_order,
            },
        ]
    };

    Some(ReorderPlan {
        neighbour: neighbour.id,
        assignments,
    })
}

/// Apply assignments from [`plan_reorder`] to an in-memory list
pub fn apply_reorder(categories: &mut [Category], assignments: &[OrderAssignment]) {
    for assignment in assignments {
        if let Some(category) = categories.iter_mut().find(|c| c.id == assignment.id) {
            category.display_order = assignment.display_order;
        }
    }
}

/// The synthetic bucket, placed after every real category
pub fn uncategorized_view(after_order: i32) -> CategoryView {
    CategoryView {
        id: None,
        name: UNCATEGORIZED_NAME.to_string(),
        slug: UNCATEGORIZED_SLUG.to_string(),
        display_order: after_order,
        is_active: true,
        icon: None,
        color: None,
    }
}

/// Active categories in display order, optionally followed by the bucket
pub fn listing(categories: &[Category], include_uncategorized: bool) -> Vec<CategoryView> {
    let mut views: Vec<CategoryView> = sorted_active(categories)
        .into_iter()
        .map(CategoryView::from)
        .collect();

    if include_uncategorized {
        let after = views.last().map_or(0, |v| v.display_order + 1);
        views.push(uncategorized_view(after));
    }
    views
}

/// Group items under active categories; anything else lands in the bucket
///
/// Categories with no items are kept so the UI can show empty sections. The
/// bucket is only emitted when it holds at least one item.
pub fn bucket_items<T>(
    categories: &[Category],
    items: Vec<T>,
    category_of: impl Fn(&T) -> Option<Uuid>,
) -> Vec<(CategoryView, Vec<T>)> {
    let mut buckets: Vec<(CategoryView, Vec<T>)> = listing(categories, false)
        .into_iter()
        .map(|view| (view, Vec::new()))
        .collect();
    let mut leftovers = Vec::new();

    for item in items {
        let slot = category_of(&item)
            .and_then(|id| buckets.iter().position(|(view, _)| view.id == Some(id)));
        match slot {
            Some(index) => buckets[index].1.push(item),
            None => leftovers.push(item),
        }
    }

    if !leftovers.is_empty() {
        let after = buckets.last().map_or(0, |(v, _)| v.display_order + 1);
        buckets.push((uncategorized_view(after), leftovers));
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Ferramenta & Minuteria"), "ferramenta-minuteria");
        assert_eq!(slugify("  --DPI--  "), "dpi");
        assert_eq!(slugify("Cavi 16mm²"), "cavi-16mm");
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify("Martelli/Scalpelli"), "martelli-scalpelli");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let taken = ["dpi", "dpi-2"];
        assert_eq!(unique_slug("dpi", |s| taken.contains(&s)), "dpi-3");
        assert_eq!(unique_slug("cavi", |s| taken.contains(&s)), "cavi");
    }

    #[test]
    fn duplicate_names_ignore_case() {
        let existing = vec![category("Ferramenta", 0, true)];
        assert_eq!(
            ensure_unique_name(&existing, "FERRAMENTA", None),
            Err(WarehouseError::DuplicateName("FERRAMENTA".to_string()))
        );
        assert!(ensure_unique_name(&existing, "ferramenta", Some(existing[0].id)).is_ok());
    }

    #[test]
    fn slug_for_skips_own_slug() {
        let existing = vec![category("DPI", 0, true)];
        assert_eq!(slug_for(&existing, "dpi", None), "dpi-2");
        assert_eq!(slug_for(&existing, "dpi", Some(existing[0].id)), "dpi");
    }

    #[test]
    fn color_must_be_in_palette() {
        assert_eq!(normalize_color(Some("Blue")).unwrap(), Some("blue".to_string()));
        assert_eq!(normalize_color(Some("  ")).unwrap(), None);
        assert!(normalize_color(Some("chartreuse")).is_err());
    }

    #[test]
    fn reorder_swaps_with_neighbour() {
        let mut cats = vec![
            category("A", 0, true),
            category("B", 1, true),
            category("C", 2, true),
        ];
        let b = cats[1].id;
        let plan = plan_reorder(&cats, b, ReorderDirection::Up).unwrap();
        assert_eq!(plan.neighbour, cats[0].id);
        assert_eq!(plan.assignments.len(), 2);
        apply_reorder(&mut cats, &plan.assignments);
        let names: Vec<_> = sorted_active(&cats).iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn reorder_at_boundaries_is_noop() {
        let cats = vec![category("A", 0, true), category("B", 1, true)];
        assert!(plan_reorder(&cats, cats[0].id, ReorderDirection::Up).is_none());
        assert!(plan_reorder(&cats, cats[1].id, ReorderDirection::Down).is_none());
    }

    #[test]
    fn reorder_skips_inactive_categories() {
        let cats = vec![
            category("A", 0, true),
            category("Hidden", 1, false),
            category("C", 2, true),
        ];
        let plan = plan_reorder(&cats, cats[2].id, ReorderDirection::Up).unwrap();
        assert_eq!(plan.neighbour, cats[0].id);
        assert!(plan_reorder(&cats, cats[1].id, ReorderDirection::Up).is_none());
    }

    #[test]
    fn reorder_with_tied_orders_moves_exactly_one_slot() {
        let mut cats = vec![
            category("B", 0, true),
            category("C", 0, true),
            category("A", 1, true),
        ];
        let a = cats[2].id;
        let plan = plan_reorder(&cats, a, ReorderDirection::Up).unwrap();
        apply_reorder(&mut cats, &plan.assignments);

        let names: Vec<_> = sorted_active(&cats).iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn next_order_follows_active_max() {
        let cats = vec![category("A", 3, true), category("B", 9, false)];
        assert_eq!(next_display_order(&cats), 4);
        assert_eq!(next_display_order(&[]), 0);
    }

    #[test]
    fn listing_appends_uncategorized_last() {
        let cats = vec![category("B", 1, true), category("A", 1, true), category("Z", 0, false)];
        let views = listing(&cats, true);
        let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", UNCATEGORIZED_NAME]);
        assert_eq!(views.last().unwrap().id, None);
    }

    #[test]
    fn bucket_items_routes_orphans_to_fallback() {
        let active = category("Active", 0, true);
        let inactive = category("Old", 1, false);
        let cats = vec![active.clone(), inactive.clone()];
        let items = vec![
            ("a", Some(active.id)),
            ("b", Some(inactive.id)),
            ("c", None),
            ("d", Some(Uuid::new_v4())),
        ];

        let buckets = bucket_items(&cats, items, |(_, cat)| *cat);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].1.len(), 1);
        assert_eq!(buckets[1].0.id, None);
        let orphans: Vec<_> = buckets[1].1.iter().map(|(n, _)| *n).collect();
        assert_eq!(orphans, vec!["b", "c", "d"]);
    }
}
