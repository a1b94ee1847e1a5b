//! Append-only audit trail
//!
//! Writes go through whatever executor the caller holds, normally the open
//! transaction of the mutation being audited, so a rolled-back change leaves
//! no audit row behind.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{AuditEntry, AuditLog, PaginatedResponse, Pagination};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::error::AppResult;

/// Record one audit row on `executor`
pub async fn record<'e, E>(executor: E, entry: &AuditEntry) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.actor_id)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.details)
    .execute(executor)
    .await?;

    Ok(())
}

/// Filters for the audit listing
#[derive(Debug, Default, Deserialize)]
pub struct AuditFilter {
    pub actor_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Read side of the audit trail
#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Newest entries first
    pub async fn list(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<AuditLog>> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM audit_logs WHERE {}",
            FILTER_CLAUSE
        ))
        .bind(filter.actor_id)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(&filter.action)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, AuditLog>(&format!(
            r#"
            SELECT id, actor_id, action, entity_type, entity_id, details, created_at
            FROM audit_logs
            WHERE {}
            ORDER BY created_at DESC
            LIMIT $7 OFFSET $8
            "#,
            FILTER_CLAUSE
        ))
        .bind(filter.actor_id)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(&filter.action)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(rows, pagination, total.max(0) as u64))
    }
}

const FILTER_CLAUSE: &str = r#"
    ($1::uuid IS NULL OR actor_id = $1)
    AND ($2::text IS NULL OR entity_type = $2)
    AND ($3::uuid IS NULL OR entity_id = $3)
    AND ($4::text IS NULL OR action = $4)
    AND ($5::timestamptz IS NULL OR created_at >= $5)
    AND ($6::timestamptz IS NULL OR created_at < $6)
"#;
