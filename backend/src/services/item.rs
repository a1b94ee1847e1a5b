//! Item catalogue service

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::categories::bucket_items;
use shared::validation::{
    clean_text, normalize_item_code, validate_initial_quantity, validate_item_code,
    validate_threshold,
};
use shared::{AuditEntry, Category, CategoryView, Item, ItemSummary, WarehouseError, DEFAULT_UNIT};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::category::CategoryService;
use crate::services::ledger::{self, MovementContext, ITEM_COLUMNS};

/// Input for creating an item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    pub min_quantity: Option<Decimal>,
    /// Recorded as a load movement when positive
    pub initial_quantity: Option<Decimal>,
}

/// Input for updating an item; quantities change only through the ledger
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 32))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    /// Set to true to detach the item from its category
    #[serde(default)]
    pub clear_category: bool,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    pub min_quantity: Option<Decimal>,
    #[serde(default)]
    pub clear_min_quantity: bool,
}

/// Item list filters
#[derive(Debug, Default, Deserialize)]
pub struct ItemFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    /// Defaults to active items only
    pub include_inactive: Option<bool>,
    pub low_stock: Option<bool>,
}

/// One section of the grouped catalogue
#[derive(Debug, Serialize)]
pub struct ItemGroup {
    pub category: CategoryView,
    pub items: Vec<ItemSummary>,
}

pub(crate) const SUMMARY_QUERY: &str = r#"
    SELECT i.id, i.code, i.name, i.unit, i.category_id, c.name AS category_name,
           i.available_quantity, i.min_quantity, i.is_active, i.is_favorite
    FROM items i
    LEFT JOIN item_categories c ON c.id = i.category_id AND c.is_active = true
"#;

fn code_error(reason: &str) -> AppError {
    AppError::validation("code", reason, "Codice articolo non valido")
}

fn quantity_error(field: &str, reason: &str) -> AppError {
    WarehouseError::invalid_quantity(field, reason).into()
}

/// Item catalogue service
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

impl ItemService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an item, optionally with opening stock
    pub async fn create(&self, actor_id: Uuid, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;

        let code = normalize_item_code(&input.code);
        validate_item_code(&code).map_err(code_error)?;
        validate_threshold(input.min_quantity).map_err(|r| quantity_error("min_quantity", r))?;
        let initial = input.initial_quantity.unwrap_or(Decimal::ZERO);
        validate_initial_quantity(initial).map_err(|r| quantity_error("initial_quantity", r))?;

        let mut tx = self.db.begin().await?;

        ensure_code_free(&mut tx, &code, None).await?;
        if let Some(category_id) = input.category_id {
            CategoryService::ensure_exists(&mut tx, category_id).await?;
        }

        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (code, name, description, category_id, unit, min_quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(&code)
        .bind(input.name.trim())
        .bind(clean_text(input.description))
        .bind(input.category_id)
        .bind(
            input
                .unit
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .unwrap_or(DEFAULT_UNIT),
        )
        .bind(input.min_quantity)
        .fetch_one(&mut *tx)
        .await?;

        let item = if initial > Decimal::ZERO {
            let context = MovementContext {
                note: Some("Giacenza iniziale".to_string()),
                ..Default::default()
            };
            ledger::load(&mut tx, item.id, initial, actor_id, &context)
                .await?
                .item
        } else {
            item
        };

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor_id, "item.create", "item")
                .entity(item.id)
                .details(json!({ "code": item.code, "initial_quantity": initial })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(item_id = %item.id, code = %item.code, "Item created");
        Ok(item)
    }

    /// Update descriptive fields of an item
    pub async fn update(&self, actor_id: Uuid, item_id: Uuid, input: UpdateItemInput) -> AppResult<Item> {
        input.validate()?;
        validate_threshold(input.min_quantity).map_err(|r| quantity_error("min_quantity", r))?;

        let mut tx = self.db.begin().await?;
        let current = ledger::lock_item(&mut tx, item_id).await?;

        let code = match input.code.as_deref() {
            Some(raw) => {
                let code = normalize_item_code(raw);
                validate_item_code(&code).map_err(code_error)?;
                if code != current.code {
                    ensure_code_free(&mut tx, &code, Some(item_id)).await?;
                }
                code
            }
            None => current.code.clone(),
        };

        let category_id = if input.clear_category {
            None
        } else {
            match input.category_id {
                Some(id) => {
                    CategoryService::ensure_exists(&mut tx, id).await?;
                    Some(id)
                }
                None => current.category_id,
            }
        };

        let min_quantity = if input.clear_min_quantity {
            None
        } else {
            input.min_quantity.or(current.min_quantity)
        };

        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
            SET code = $2, name = $3, description = $4, category_id = $5,
                unit = $6, min_quantity = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(&code)
        .bind(input.name.as_deref().map(str::trim).unwrap_or(current.name.as_str()))
        .bind(match input.description {
            Some(d) => clean_text(Some(d)),
            None => current.description.clone(),
        })
        .bind(category_id)
        .bind(input.unit.as_deref().map(str::trim).unwrap_or(current.unit.as_str()))
        .bind(min_quantity)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor_id, "item.update", "item")
                .entity(item_id)
                .details(json!({ "code": item.code })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(%item_id, "Item updated");
        Ok(item)
    }

    /// Flip the active flag; inactive items are hidden but keep their history
    pub async fn toggle_active(&self, actor_id: Uuid, item_id: Uuid) -> AppResult<Item> {
        self.toggle(actor_id, item_id, "is_active", "item.toggle_active").await
    }

    pub async fn toggle_favorite(&self, actor_id: Uuid, item_id: Uuid) -> AppResult<Item> {
        self.toggle(actor_id, item_id, "is_favorite", "item.toggle_favorite").await
    }

    async fn toggle(
        &self,
        actor_id: Uuid,
        item_id: Uuid,
        column: &'static str,
        action: &'static str,
    ) -> AppResult<Item> {
        let mut tx = self.db.begin().await?;

        let item = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET {col} = NOT {col}, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ITEM_COLUMNS,
            col = column
        ))
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(WarehouseError::item_not_found)?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor_id, action, "item")
                .entity(item_id)
                .details(json!({ "is_active": item.is_active, "is_favorite": item.is_favorite })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(%item_id, action, "Item flag toggled");
        Ok(item)
    }

    pub async fn get(&self, item_id: Uuid) -> AppResult<Item> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(WarehouseError::item_not_found)?;

        Ok(item)
    }

    /// Items matching `filter`, favorites first then by name
    pub async fn list(&self, filter: &ItemFilter) -> AppResult<Vec<ItemSummary>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let items = sqlx::query_as::<_, ItemSummary>(&format!(
            r#"
            {}
            WHERE ($1 = true OR i.is_active = true)
              AND ($2::uuid IS NULL OR i.category_id = $2)
              AND ($3::text IS NULL OR i.code ILIKE $3 OR i.name ILIKE $3)
              AND ($4 = false OR (i.min_quantity IS NOT NULL AND i.available_quantity <= i.min_quantity))
            ORDER BY i.is_favorite DESC, i.name ASC
            "#,
            SUMMARY_QUERY
        ))
        .bind(filter.include_inactive.unwrap_or(false))
        .bind(filter.category_id)
        .bind(search)
        .bind(filter.low_stock.unwrap_or(false))
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Active items at or below their threshold
    pub async fn low_stock(&self) -> AppResult<Vec<ItemSummary>> {
        self.list(&ItemFilter {
            low_stock: Some(true),
            ..Default::default()
        })
        .await
    }

    /// Active items grouped under active categories, orphans last
    pub async fn grouped(&self) -> AppResult<Vec<ItemGroup>> {
        let categories: Vec<Category> = CategoryService::new(self.db.clone()).all().await?;
        let items = self.list(&ItemFilter::default()).await?;

        Ok(bucket_items(&categories, items, |item| item.category_id)
            .into_iter()
            .map(|(category, items)| ItemGroup { category, items })
            .collect())
    }
}

async fn ensure_code_free(
    conn: &mut PgConnection,
    code: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM items WHERE code = $1 AND ($2::uuid IS NULL OR id <> $2))",
    )
    .bind(code)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        return Err(WarehouseError::DuplicateCode(code.to_string()).into());
    }
    Ok(())
}
