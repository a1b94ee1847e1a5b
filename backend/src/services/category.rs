//! Category registry service

use serde::Deserialize;
use serde_json::json;
use shared::categories::{
    ensure_unique_name, listing, next_display_order, normalize_color, normalize_name,
    plan_reorder, slug_for, sorted_active,
};
use shared::validation::clean_text;
use shared::{AuditEntry, Category, CategoryView, ReorderDirection, WarehouseError};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::services::audit;

/// Input for creating a category
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(max = 100))]
    pub name: String,
    pub display_order: Option<i32>,
    #[validate(length(max = 64))]
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

/// Input for updating a category
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(max = 100))]
    pub name: Option<String>,
    pub display_order: Option<i32>,
    #[validate(length(max = 64))]
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

/// Category listing options
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub include_uncategorized: bool,
}

const CATEGORY_COLUMNS: &str =
    "id, name, slug, display_order, is_active, icon, color, created_at, updated_at";

/// Category registry service
#[derive(Clone)]
pub struct CategoryService {
    db: PgPool,
}

impl CategoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Every category, active or not
    pub async fn all(&self) -> AppResult<Vec<Category>> {
        let mut conn = self.db.acquire().await?;
        load_all(&mut conn, false).await
    }

    /// Categories for display, optionally with the uncategorized bucket
    pub async fn list(&self, query: &CategoryQuery) -> AppResult<Vec<CategoryView>> {
        let categories = self.all().await?;

        if query.include_inactive {
            let mut all: Vec<&Category> = categories.iter().collect();
            all.sort_by(|a, b| {
                b.is_active
                    .cmp(&a.is_active)
                    .then(a.display_order.cmp(&b.display_order))
                    .then_with(|| a.name.cmp(&b.name))
            });
            let mut views: Vec<CategoryView> = all.into_iter().map(CategoryView::from).collect();
            if query.include_uncategorized {
                let after = sorted_active(&categories)
                    .last()
                    .map_or(0, |c| c.display_order + 1);
                views.push(shared::categories::uncategorized_view(after));
            }
            return Ok(views);
        }

        Ok(listing(&categories, query.include_uncategorized))
    }

    pub async fn get(&self, category_id: Uuid) -> AppResult<Category> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM item_categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(WarehouseError::category_not_found)?;

        Ok(category)
    }

    /// Fails unless `category_id` names an active category
    pub async fn ensure_exists(conn: &mut PgConnection, category_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM item_categories WHERE id = $1 AND is_active = true)",
        )
        .bind(category_id)
        .fetch_one(&mut *conn)
        .await?;

        if !exists {
            return Err(WarehouseError::category_not_found().into());
        }
        Ok(())
    }

    pub async fn create(&self, actor_id: Uuid, input: CreateCategoryInput) -> AppResult<Category> {
        input.validate()?;
        let name = normalize_name(&input.name)?;
        let color = normalize_color(input.color.as_deref())?;

        let mut tx = self.db.begin().await?;
        let existing = load_all(&mut tx, true).await?;

        ensure_unique_name(&existing, &name, None)?;
        let slug = slug_for(&existing, &name, None);
        let display_order = input
            .display_order
            .unwrap_or_else(|| next_display_order(&existing));

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO item_categories (name, slug, display_order, is_active, icon, color)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(&name)
        .bind(&slug)
        .bind(display_order)
        .bind(input.is_active.unwrap_or(true))
        .bind(clean_text(input.icon))
        .bind(color)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor_id, "category.create", "category")
                .entity(category.id)
                .details(json!({ "name": category.name, "slug": category.slug })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    pub async fn update(
        &self,
        actor_id: Uuid,
        category_id: Uuid,
        input: UpdateCategoryInput,
    ) -> AppResult<Category> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let existing = load_all(&mut tx, true).await?;
        let current = existing
            .iter()
            .find(|c| c.id == category_id)
            .cloned()
            .ok_or_else(WarehouseError::category_not_found)?;

        let (name, slug) = match input.name.as_deref() {
            Some(raw) => {
                let name = normalize_name(raw)?;
                ensure_unique_name(&existing, &name, Some(category_id))?;
                if name == current.name {
                    (name, current.slug.clone())
                } else {
                    let slug = slug_for(&existing, &name, Some(category_id));
                    (name, slug)
                }
            }
            None => (current.name.clone(), current.slug.clone()),
        };

        let color = match input.color.as_deref() {
            Some(raw) => normalize_color(Some(raw))?,
            None => current.color.clone(),
        };
        let icon = match input.icon {
            Some(icon) => clean_text(Some(icon)),
            None => current.icon.clone(),
        };

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE item_categories
            SET name = $2, slug = $3, display_order = $4, is_active = $5,
                icon = $6, color = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .bind(&name)
        .bind(&slug)
        .bind(input.display_order.unwrap_or(current.display_order))
        .bind(input.is_active.unwrap_or(current.is_active))
        .bind(icon)
        .bind(color)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor_id, "category.update", "category")
                .entity(category_id)
                .details(json!({ "name": category.name, "slug": category.slug })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(%category_id, "Category updated");
        Ok(category)
    }

    pub async fn toggle_active(&self, actor_id: Uuid, category_id: Uuid) -> AppResult<Category> {
        self.set_active(actor_id, category_id, None).await
    }

    /// Deactivate; items keep their link and fall into the uncategorized bucket
    pub async fn disable(&self, actor_id: Uuid, category_id: Uuid) -> AppResult<Category> {
        self.set_active(actor_id, category_id, Some(false)).await
    }

    async fn set_active(
        &self,
        actor_id: Uuid,
        category_id: Uuid,
        value: Option<bool>,
    ) -> AppResult<Category> {
        let mut tx = self.db.begin().await?;

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE item_categories
            SET is_active = COALESCE($2, NOT is_active), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .bind(value)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(WarehouseError::category_not_found)?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor_id, "category.set_active", "category")
                .entity(category_id)
                .details(json!({ "is_active": category.is_active })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(%category_id, is_active = category.is_active, "Category state changed");
        Ok(category)
    }

    /// Move a category one slot; a no-op at either end or when inactive
    pub async fn reorder(
        &self,
        actor_id: Uuid,
        category_id: Uuid,
        direction: ReorderDirection,
    ) -> AppResult<Vec<CategoryView>> {
        let mut tx = self.db.begin().await?;
        let existing = load_all(&mut tx, true).await?;

        if !existing.iter().any(|c| c.id == category_id) {
            return Err(WarehouseError::category_not_found().into());
        }

        let Some(plan) = plan_reorder(&existing, category_id, direction) else {
            tx.rollback().await?;
            return Ok(listing(&existing, false));
        };

        for assignment in &plan.assignments {
            sqlx::query(
                "UPDATE item_categories SET display_order = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(assignment.id)
            .bind(assignment.display_order)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor_id, "category.reorder", "category")
                .entity(category_id)
                .details(json!({ "direction": direction, "swapped_with": plan.neighbour })),
        )
        .await?;

        let updated = load_all(&mut tx, false).await?;
        tx.commit().await?;

        tracing::info!(%category_id, ?direction, "Category reordered");
        Ok(listing(&updated, false))
    }
}

/// All category rows, optionally locked for the rest of the transaction
async fn load_all(conn: &mut PgConnection, for_update: bool) -> AppResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(&format!(
        "SELECT {} FROM item_categories ORDER BY display_order, name, id{}",
        CATEGORY_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(categories)
}
