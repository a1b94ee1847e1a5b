//! Stock ledger primitives
//!
//! Every function here runs on a connection the caller already holds inside
//! a transaction. Item rows are locked `FOR UPDATE` before any availability
//! decision and, when several rows are involved, always in ascending id
//! order. Each quantity change is written together with exactly one
//! movement. Auditing and notifications belong to the callers.

use std::collections::HashMap;

use rust_decimal::Decimal;
use shared::stock::{plan_adjust, plan_load, plan_unload, StockChange};
use shared::{Item, Movement, WarehouseError};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;

pub(crate) const ITEM_COLUMNS: &str = "id, code, name, description, category_id, unit, \
     available_quantity, min_quantity, is_active, is_favorite, created_at, updated_at";

const MOVEMENT_COLUMNS: &str =
    "id, item_id, kind, quantity, site_id, request_line_id, actor_id, note, created_at";

/// Where a movement came from, beyond the item and the actor
#[derive(Debug, Clone, Default)]
pub struct MovementContext {
    pub site_id: Option<Uuid>,
    pub request_line_id: Option<Uuid>,
    pub note: Option<String>,
}

/// A recorded change and the item state around it
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub movement: Movement,
    pub item: Item,
    /// The change took the item from above its threshold to at or below it
    pub crossed_threshold: bool,
}

/// Lock one item row for the rest of the transaction
pub async fn lock_item(conn: &mut PgConnection, item_id: Uuid) -> AppResult<Item> {
    let item = sqlx::query_as::<_, Item>(&format!(
        "SELECT {} FROM items WHERE id = $1 FOR UPDATE",
        ITEM_COLUMNS
    ))
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(WarehouseError::item_not_found)?;

    Ok(item)
}

/// Lock several item rows in ascending id order; missing ids are skipped
pub async fn lock_items(
    conn: &mut PgConnection,
    item_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Item>> {
    let mut ids = item_ids.to_vec();
    ids.sort();
    ids.dedup();

    let items = sqlx::query_as::<_, Item>(&format!(
        "SELECT {} FROM items WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        ITEM_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items.into_iter().map(|item| (item.id, item)).collect())
}

/// Read several item rows without locking them
pub async fn items_by_id(
    conn: &mut PgConnection,
    item_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Item>> {
    let items = sqlx::query_as::<_, Item>(&format!(
        "SELECT {} FROM items WHERE id = ANY($1)",
        ITEM_COLUMNS
    ))
    .bind(item_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items.into_iter().map(|item| (item.id, item)).collect())
}

/// Persist an accepted change on a locked item and append its movement
pub async fn record_change(
    conn: &mut PgConnection,
    item: &Item,
    change: &StockChange,
    actor_id: Uuid,
    context: &MovementContext,
) -> AppResult<LedgerEntry> {
    let crossed_threshold = item.crosses_threshold(change);

    let updated = sqlx::query_as::<_, Item>(&format!(
        r#"
        UPDATE items
        SET available_quantity = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        ITEM_COLUMNS
    ))
    .bind(item.id)
    .bind(change.new_available)
    .fetch_one(&mut *conn)
    .await?;

    let movement = sqlx::query_as::<_, Movement>(&format!(
        r#"
        INSERT INTO stock_movements (item_id, kind, quantity, site_id, request_line_id, actor_id, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(item.id)
    .bind(change.kind)
    .bind(change.quantity)
    .bind(context.site_id)
    .bind(context.request_line_id)
    .bind(actor_id)
    .bind(&context.note)
    .fetch_one(&mut *conn)
    .await?;

    Ok(LedgerEntry {
        movement,
        item: updated,
        crossed_threshold,
    })
}

/// Add `quantity` to an item
pub async fn load(
    conn: &mut PgConnection,
    item_id: Uuid,
    quantity: Decimal,
    actor_id: Uuid,
    context: &MovementContext,
) -> AppResult<LedgerEntry> {
    let item = lock_item(conn, item_id).await?;
    let change = plan_load(item.available_quantity, quantity)?;
    record_change(conn, &item, &change, actor_id, context).await
}

/// Remove `quantity` from an item, never below zero
pub async fn unload(
    conn: &mut PgConnection,
    item_id: Uuid,
    quantity: Decimal,
    actor_id: Uuid,
    context: &MovementContext,
) -> AppResult<LedgerEntry> {
    let item = lock_item(conn, item_id).await?;
    let change = plan_unload(&item, quantity)?;
    record_change(conn, &item, &change, actor_id, context).await
}

/// Set availability directly; `None` when the value is unchanged
pub async fn adjust(
    conn: &mut PgConnection,
    item_id: Uuid,
    new_quantity: Decimal,
    actor_id: Uuid,
    context: &MovementContext,
) -> AppResult<Option<LedgerEntry>> {
    let item = lock_item(conn, item_id).await?;
    match plan_adjust(item.available_quantity, new_quantity)? {
        Some(change) => Ok(Some(
            record_change(conn, &item, &change, actor_id, context).await?,
        )),
        None => Ok(None),
    }
}
