//! Audited stock operations and movement history

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::permissions::caps;
use shared::validation::clean_text;
use shared::{
    AuditEntry, Item, Movement, MovementKind, MovementView, NotificationKind, PaginatedResponse,
    Pagination, Recipient,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::audit;
use crate::services::ledger::{self, LedgerEntry, MovementContext};
use crate::services::notification::{Notice, NotificationService};

/// Input for loading stock
#[derive(Debug, Deserialize)]
pub struct LoadInput {
    pub quantity: Decimal,
    pub note: Option<String>,
}

/// Input for unloading stock to a site
#[derive(Debug, Deserialize)]
pub struct UnloadInput {
    pub quantity: Decimal,
    pub site_id: Option<Uuid>,
    pub note: Option<String>,
}

/// Input for an inventory correction
#[derive(Debug, Deserialize)]
pub struct AdjustInput {
    pub new_quantity: Decimal,
    pub note: Option<String>,
}

/// Movement history filters
#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub item_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    pub site_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Rows returned by an unpaginated export
const EXPORT_LIMIT: i64 = 10_000;

const MOVEMENT_VIEW_QUERY: &str = r#"
    SELECT m.id, m.item_id, i.code AS item_code, i.name AS item_name,
           m.kind, m.quantity, m.site_id, s.name AS site_name,
           m.request_line_id, m.actor_id, u.name AS actor_name,
           m.note, m.created_at
    FROM stock_movements m
    JOIN items i ON i.id = m.item_id
    JOIN users u ON u.id = m.actor_id
    LEFT JOIN sites s ON s.id = m.site_id
    WHERE ($1::uuid IS NULL OR m.item_id = $1)
      AND ($2::movement_kind IS NULL OR m.kind = $2)
      AND ($3::uuid IS NULL OR m.site_id = $3)
      AND ($4::timestamptz IS NULL OR m.created_at >= $4)
      AND ($5::timestamptz IS NULL OR m.created_at < $5)
"#;

/// Notice for managers when an item reaches its threshold
pub(crate) fn low_stock_notice(item: &Item) -> Notice {
    Notice::new(
        Recipient::Capability(caps::INVENTORY_MANAGE.to_string()),
        NotificationKind::LowStock,
        format!(
            "Scorta bassa: {} {} ({} {} disponibili)",
            item.code,
            item.name,
            item.available_quantity.normalize(),
            item.unit
        ),
    )
    .link(format!("/magazzino/articoli/{}", item.id))
}

/// Stock service: ledger operations with audit and low-stock alerts
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    notifier: NotificationService,
}

impl StockService {
    pub fn new(db: PgPool) -> Self {
        Self {
            notifier: NotificationService::new(db.clone()),
            db,
        }
    }

    /// Record goods received into the warehouse
    pub async fn load(&self, actor_id: Uuid, item_id: Uuid, input: LoadInput) -> AppResult<Movement> {
        let context = MovementContext {
            note: clean_text(input.note),
            ..Default::default()
        };

        let mut tx = self.db.begin().await?;
        let entry = ledger::load(&mut tx, item_id, input.quantity, actor_id, &context).await?;
        audit::record(&mut *tx, &movement_audit("stock.load", actor_id, &entry)).await?;
        tx.commit().await?;

        tracing::info!(%item_id, quantity = %input.quantity, "Stock loaded");
        Ok(entry.movement)
    }

    /// Record goods leaving the warehouse
    pub async fn unload(
        &self,
        actor_id: Uuid,
        item_id: Uuid,
        input: UnloadInput,
    ) -> AppResult<Movement> {
        let context = MovementContext {
            site_id: input.site_id,
            note: clean_text(input.note),
            ..Default::default()
        };

        let mut tx = self.db.begin().await?;
        let entry = ledger::unload(&mut tx, item_id, input.quantity, actor_id, &context).await?;
        audit::record(&mut *tx, &movement_audit("stock.unload", actor_id, &entry)).await?;
        tx.commit().await?;

        tracing::info!(%item_id, quantity = %input.quantity, "Stock unloaded");
        self.alert_if_low(&entry).await;
        Ok(entry.movement)
    }

    /// Correct availability after a physical count
    pub async fn adjust(
        &self,
        actor_id: Uuid,
        item_id: Uuid,
        input: AdjustInput,
    ) -> AppResult<Option<Movement>> {
        let context = MovementContext {
            note: clean_text(input.note),
            ..Default::default()
        };

        let mut tx = self.db.begin().await?;
        let entry = ledger::adjust(&mut tx, item_id, input.new_quantity, actor_id, &context).await?;
        let Some(entry) = entry else {
            // Nothing changed, nothing to audit
            tx.rollback().await?;
            return Ok(None);
        };
        audit::record(&mut *tx, &movement_audit("stock.adjust", actor_id, &entry)).await?;
        tx.commit().await?;

        tracing::info!(%item_id, new_quantity = %input.new_quantity, "Stock adjusted");
        self.alert_if_low(&entry).await;
        Ok(Some(entry.movement))
    }

    async fn alert_if_low(&self, entry: &LedgerEntry) {
        if entry.crossed_threshold {
            self.notifier
                .dispatch(vec![low_stock_notice(&entry.item)])
                .await;
        }
    }

    /// Movement history, newest first
    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<MovementView>> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM ({}) AS filtered",
            MOVEMENT_VIEW_QUERY
        ))
        .bind(filter.item_id)
        .bind(filter.kind)
        .bind(filter.site_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let rows = self
            .fetch_movements(filter, pagination.limit(), pagination.offset())
            .await?;

        Ok(PaginatedResponse::new(rows, pagination, total.max(0) as u64))
    }

    /// Every movement matching `filter`, for CSV export
    pub async fn export_movements(&self, filter: &MovementFilter) -> AppResult<Vec<MovementView>> {
        self.fetch_movements(filter, EXPORT_LIMIT, 0).await
    }

    async fn fetch_movements(
        &self,
        filter: &MovementFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<MovementView>> {
        let rows = sqlx::query_as::<_, MovementView>(&format!(
            "{} ORDER BY m.created_at DESC, m.id LIMIT $6 OFFSET $7",
            MOVEMENT_VIEW_QUERY
        ))
        .bind(filter.item_id)
        .bind(filter.kind)
        .bind(filter.site_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

fn movement_audit(action: &'static str, actor_id: Uuid, entry: &LedgerEntry) -> AuditEntry {
    AuditEntry::new(actor_id, action, "item")
        .entity(entry.item.id)
        .details(json!({
            "movement_id": entry.movement.id,
            "kind": entry.movement.kind,
            "quantity": entry.movement.quantity,
            "available_quantity": entry.item.available_quantity,
            "site_id": entry.movement.site_id,
        }))
}
