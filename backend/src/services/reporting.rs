//! Reporting service for stock snapshots, movement exports and dashboard totals

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::item::SUMMARY_QUERY;
use crate::services::stock::{MovementFilter, StockService};
use shared::{ItemSummary, MovementView};

/// Output format requested with `?format=`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

/// Stock report filters
#[derive(Debug, Default, Deserialize)]
pub struct StockReportFilter {
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub low_stock_only: bool,
    #[serde(default)]
    pub format: ReportFormat,
}

/// One row of the stock report, flat so it serializes to CSV
#[derive(Debug, Clone, Serialize)]
pub struct StockReportRow {
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub available_quantity: Decimal,
    pub min_quantity: Option<Decimal>,
    pub low_stock: bool,
}

impl From<ItemSummary> for StockReportRow {
    fn from(item: ItemSummary) -> Self {
        let low_stock = item.is_low_stock();
        Self {
            code: item.code,
            name: item.name,
            category: item.category_name.unwrap_or_default(),
            unit: item.unit,
            available_quantity: item.available_quantity,
            min_quantity: item.min_quantity,
            low_stock,
        }
    }
}

/// Movement export row
#[derive(Debug, Clone, Serialize)]
pub struct MovementReportRow {
    pub created_at: String,
    pub item_code: String,
    pub item_name: String,
    pub kind: String,
    pub quantity: Decimal,
    pub site: String,
    pub actor: String,
    pub note: String,
}

impl From<MovementView> for MovementReportRow {
    fn from(m: MovementView) -> Self {
        Self {
            created_at: m.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            item_code: m.item_code,
            item_name: m.item_name,
            kind: m.kind.as_str().to_string(),
            quantity: m.quantity,
            site: m.site_name.unwrap_or_default(),
            actor: m.actor_name,
            note: m.note.unwrap_or_default(),
        }
    }
}

/// Dashboard totals
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub active_items: i64,
    pub low_stock_items: i64,
    pub pending_requests: i64,
    pub approved_requests: i64,
    pub movements_last_30_days: i64,
}

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Active items with category and low-stock flag, by category then code
    pub async fn stock_report(&self, filter: &StockReportFilter) -> AppResult<Vec<StockReportRow>> {
        let rows = sqlx::query_as::<_, ItemSummary>(&format!(
            r#"
            {}
            WHERE i.is_active = true
              AND ($1::uuid IS NULL OR i.category_id = $1)
              AND (NOT $2 OR (i.min_quantity IS NOT NULL AND i.available_quantity <= i.min_quantity))
            ORDER BY c.display_order NULLS LAST, i.code
            "#,
            SUMMARY_QUERY
        ))
        .bind(filter.category_id)
        .bind(filter.low_stock_only)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockReportRow::from).collect())
    }

    /// Movements matching `filter`, flattened for export
    pub async fn movement_report(&self, filter: &MovementFilter) -> AppResult<Vec<MovementReportRow>> {
        let rows = StockService::new(self.db.clone())
            .export_movements(filter)
            .await?;
        Ok(rows.into_iter().map(MovementReportRow::from).collect())
    }

    /// Headline counts for the dashboard
    pub async fn dashboard(&self) -> AppResult<DashboardMetrics> {
        let since = Utc::now() - Duration::days(30);

        let (active_items, low_stock_items) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (
                    WHERE min_quantity IS NOT NULL AND available_quantity <= min_quantity
                )
            FROM items
            WHERE is_active = true
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let (pending_requests, approved_requests) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE status IN ('approved', 'partially_fulfilled'))
            FROM warehouse_requests
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let movements_last_30_days = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_movements WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(DashboardMetrics {
            active_items,
            low_stock_items,
            pending_requests,
            approved_requests,
            movements_last_30_days,
        })
    }

    /// Serialize rows to CSV with a header line
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(available: i64, min: Option<i64>) -> ItemSummary {
        ItemSummary {
            id: Uuid::new_v4(),
            code: "CHI-010".to_string(),
            name: "Chiodi 10cm".to_string(),
            unit: "kg".to_string(),
            category_id: None,
            category_name: Some("Ferramenta".to_string()),
            available_quantity: Decimal::from(available),
            min_quantity: min.map(Decimal::from),
            is_active: true,
            is_favorite: false,
        }
    }

    #[test]
    fn stock_row_flags_low_stock() {
        assert!(StockReportRow::from(summary(3, Some(5))).low_stock);
        assert!(StockReportRow::from(summary(5, Some(5))).low_stock);
        assert!(!StockReportRow::from(summary(6, Some(5))).low_stock);
        assert!(!StockReportRow::from(summary(0, None)).low_stock);
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let rows = vec![StockReportRow::from(summary(3, Some(5)))];
        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("code,name,category,unit,available_quantity,min_quantity,low_stock")
        );
        assert_eq!(lines.next(), Some("CHI-010,Chiodi 10cm,Ferramenta,kg,3,5,true"));
    }

    #[test]
    fn csv_export_of_nothing_is_empty() {
        let rows: Vec<StockReportRow> = Vec::new();
        assert_eq!(ReportingService::export_to_csv(&rows).unwrap(), "");
    }
}
