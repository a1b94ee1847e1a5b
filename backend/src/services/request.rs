//! Supply request workflow service
//!
//! Loads and locks the rows a transition needs, runs the state machine from
//! `shared::workflow`, persists the outcome with its audit row in the same
//! transaction, and only then sends notifications.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::permissions::caps;
use shared::validation::clean_text;
use shared::workflow::{ensure_items_requestable, merge_lines};
use shared::{
    AuditEntry, Item, LineInput, NotificationKind, PaginatedResponse, Pagination, Priority,
    Recipient, Request, RequestLine, RequestLineView, RequestStatus, RequestWithLines,
    WarehouseError,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::ledger::{self, MovementContext};
use crate::services::notification::{Notice, NotificationService};
use crate::services::stock::low_stock_notice;

/// Input for submitting a request
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequestInput {
    pub lines: Vec<LineInput>,
    pub priority: Option<Priority>,
    pub needed_by: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    pub site_id: Option<Uuid>,
}

/// Replacement lines for a pending request
#[derive(Debug, Deserialize)]
pub struct ReviseRequestInput {
    pub lines: Vec<LineInput>,
}

/// Manager's answer on approve or reject
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ResponseInput {
    #[validate(length(max = 2000))]
    pub response: Option<String>,
}

/// Per-line amounts for a fulfillment; omitted lines take their residual
#[derive(Debug, Default, Deserialize)]
pub struct FulfillInput {
    #[serde(default)]
    pub quantities: HashMap<Uuid, Decimal>,
}

/// Request list filters
#[derive(Debug, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub requester_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
}

/// Who is looking at or acting on a request
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    /// Holds `warehouse.requests.manage`
    pub can_manage: bool,
}

impl Actor {
    /// Foreign requests look missing to anyone who cannot manage them
    pub fn ensure_visible(&self, request: &Request) -> AppResult<()> {
        if request.requester_id == self.user_id || self.can_manage {
            Ok(())
        } else {
            Err(WarehouseError::request_not_found().into())
        }
    }
}

fn mark_read_entry(reader_id: Uuid, request_id: Uuid) -> AuditEntry {
    AuditEntry::new(reader_id, "request.mark_read", "warehouse_request").entity(request_id)
}

const REQUEST_COLUMNS: &str = "id, requester_id, site_id, priority, needed_by, note, status, \
     response, handled_by, handled_at, requester_read, created_at, updated_at";

fn request_link(request_id: Uuid) -> String {
    format!("/magazzino/richieste/{}", request_id)
}

fn requester_notice(request: &Request) -> Option<Notice> {
    let (kind, message) = match request.status {
        RequestStatus::Approved => (
            NotificationKind::RequestApproved,
            "La tua richiesta di materiale è stata approvata",
        ),
        RequestStatus::Rejected => (
            NotificationKind::RequestRejected,
            "La tua richiesta di materiale è stata rifiutata",
        ),
        RequestStatus::Fulfilled => (
            NotificationKind::RequestFulfilled,
            "La tua richiesta di materiale è stata evasa",
        ),
        RequestStatus::PartiallyFulfilled => (
            NotificationKind::RequestPartiallyFulfilled,
            "La tua richiesta di materiale è stata evasa parzialmente",
        ),
        RequestStatus::Pending => return None,
    };

    Some(
        Notice::new(Recipient::User(request.requester_id), kind, message)
            .link(request_link(request.id)),
    )
}

/// Supply request workflow service
#[derive(Clone)]
pub struct RequestService {
    db: PgPool,
    notifier: NotificationService,
}

impl RequestService {
    pub fn new(db: PgPool) -> Self {
        Self {
            notifier: NotificationService::new(db.clone()),
            db,
        }
    }

    /// Submit a new pending request; stock is not checked yet
    pub async fn submit(
        &self,
        requester_id: Uuid,
        input: SubmitRequestInput,
    ) -> AppResult<RequestWithLines> {
        input.validate()?;
        let lines = merge_lines(&input.lines)?;

        let mut tx = self.db.begin().await?;

        let ids: Vec<Uuid> = lines.iter().map(|l| l.item_id).collect();
        let items = ledger::items_by_id(&mut tx, &ids).await?;
        ensure_items_requestable(&lines, &items)?;

        if let Some(site_id) = input.site_id {
            ensure_site(&mut tx, site_id).await?;
        }

        let request = sqlx::query_as::<_, Request>(&format!(
            r#"
            INSERT INTO warehouse_requests (requester_id, site_id, priority, needed_by, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(requester_id)
        .bind(input.site_id)
        .bind(input.priority.unwrap_or_default())
        .bind(input.needed_by)
        .bind(clean_text(input.note))
        .fetch_one(&mut *tx)
        .await?;

        insert_lines(&mut tx, request.id, &lines).await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(requester_id, "request.submit", "warehouse_request")
                .entity(request.id)
                .details(json!({ "lines": lines })),
        )
        .await?;

        let detail = load_detail(&mut tx, request).await?;
        tx.commit().await?;

        tracing::info!(request_id = %detail.request.id, lines = detail.lines.len(), "Request submitted");

        let notice = Notice::new(
            Recipient::Capability(caps::REQUESTS_MANAGE.to_string()),
            NotificationKind::RequestSubmitted,
            format!("Nuova richiesta di materiale ({} articoli)", detail.lines.len()),
        )
        .link(request_link(detail.request.id))
        .except(requester_id);
        self.notifier.dispatch(vec![notice]).await;

        Ok(detail)
    }

    /// Replace the lines of a pending request
    pub async fn revise(
        &self,
        actor: Actor,
        request_id: Uuid,
        input: ReviseRequestInput,
    ) -> AppResult<RequestWithLines> {
        let lines = merge_lines(&input.lines)?;

        let mut tx = self.db.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;

        actor.ensure_visible(&request)?;
        request.ensure_revisable()?;

        let ids: Vec<Uuid> = lines.iter().map(|l| l.item_id).collect();
        let items = ledger::items_by_id(&mut tx, &ids).await?;
        ensure_items_requestable(&lines, &items)?;

        sqlx::query("DELETE FROM warehouse_request_lines WHERE request_id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        insert_lines(&mut tx, request_id, &lines).await?;

        request.updated_at = Utc::now();
        save_request(&mut tx, &request).await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(actor.user_id, "request.revise", "warehouse_request")
                .entity(request_id)
                .details(json!({ "lines": lines })),
        )
        .await?;

        let detail = load_detail(&mut tx, request).await?;
        tx.commit().await?;

        tracing::info!(%request_id, "Request revised");
        Ok(detail)
    }

    /// Approve a pending request if stock currently covers it
    pub async fn approve(
        &self,
        handler_id: Uuid,
        request_id: Uuid,
        input: ResponseInput,
    ) -> AppResult<RequestWithLines> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;
        let lines = lock_lines(&mut tx, request_id).await?;
        let ids: Vec<Uuid> = lines.iter().map(|l| l.item_id).collect();
        let items = ledger::lock_items(&mut tx, &ids).await?;

        request.approve(&lines, &items, handler_id, clean_text(input.response), Utc::now())?;
        save_request(&mut tx, &request).await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(handler_id, "request.approve", "warehouse_request")
                .entity(request_id)
                .details(json!({ "response": request.response })),
        )
        .await?;

        let detail = load_detail(&mut tx, request).await?;
        tx.commit().await?;

        tracing::info!(%request_id, %handler_id, "Request approved");
        self.notifier
            .dispatch(requester_notice(&detail.request).into_iter().collect())
            .await;
        Ok(detail)
    }

    /// Reject a pending or approved request
    pub async fn reject(
        &self,
        handler_id: Uuid,
        request_id: Uuid,
        input: ResponseInput,
    ) -> AppResult<RequestWithLines> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;

        request.reject(handler_id, clean_text(input.response), Utc::now())?;
        save_request(&mut tx, &request).await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(handler_id, "request.reject", "warehouse_request")
                .entity(request_id)
                .details(json!({ "response": request.response })),
        )
        .await?;

        let detail = load_detail(&mut tx, request).await?;
        tx.commit().await?;

        tracing::info!(%request_id, %handler_id, "Request rejected");
        self.notifier
            .dispatch(requester_notice(&detail.request).into_iter().collect())
            .await;
        Ok(detail)
    }

    /// Hand out stock against an approved request, all lines or none
    pub async fn fulfill(
        &self,
        handler_id: Uuid,
        request_id: Uuid,
        input: FulfillInput,
    ) -> AppResult<RequestWithLines> {
        let mut tx = self.db.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;
        let mut lines = lock_lines(&mut tx, request_id).await?;
        let ids: Vec<Uuid> = lines.iter().map(|l| l.item_id).collect();
        let mut items = ledger::lock_items(&mut tx, &ids).await?;

        let plan = request.plan_fulfillment(&lines, &input.quantities, &items)?;

        let mut running: HashMap<Uuid, Item> = items.clone();
        let applied =
            request.apply_fulfillment(&plan, &mut lines, &mut items, handler_id, Utc::now());

        let mut low_stock = Vec::new();
        for allocation in &applied {
            let prior = running
                .get(&allocation.item_id)
                .cloned()
                .ok_or_else(WarehouseError::item_not_found)?;
            let context = MovementContext {
                site_id: request.site_id,
                request_line_id: Some(allocation.line_id),
                note: None,
            };
            let entry =
                ledger::record_change(&mut tx, &prior, &allocation.change, handler_id, &context)
                    .await?;
            if entry.crossed_threshold {
                low_stock.push(low_stock_notice(&entry.item));
            }
            running.insert(entry.item.id, entry.item);
        }

        for line in lines.iter().filter(|l| applied.iter().any(|a| a.line_id == l.id)) {
            sqlx::query("UPDATE warehouse_request_lines SET fulfilled_quantity = $2 WHERE id = $1")
                .bind(line.id)
                .bind(line.fulfilled_quantity)
                .execute(&mut *tx)
                .await?;
        }
        save_request(&mut tx, &request).await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(handler_id, "request.fulfill", "warehouse_request")
                .entity(request_id)
                .details(json!({
                    "allocations": plan.allocations,
                    "status": request.status,
                })),
        )
        .await?;

        let detail = load_detail(&mut tx, request).await?;
        tx.commit().await?;

        tracing::info!(
            %request_id,
            %handler_id,
            status = %detail.request.status,
            movements = applied.len(),
            "Request fulfilled"
        );

        let mut notices: Vec<Notice> = requester_notice(&detail.request).into_iter().collect();
        notices.extend(low_stock);
        self.notifier.dispatch(notices).await;

        Ok(detail)
    }

    /// Requester acknowledges the answer; returns whether anything changed
    pub async fn mark_read(&self, reader_id: Uuid, request_id: Uuid) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;
        let mut request = lock_request(&mut tx, request_id).await?;

        if !request.mark_read(reader_id) {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE warehouse_requests SET requester_read = true WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        audit::record(&mut *tx, &mark_read_entry(reader_id, request_id)).await?;
        tx.commit().await?;

        Ok(true)
    }

    /// One request with its lines
    ///
    /// Users without the manage capability only see their own requests;
    /// opening a handled request as its requester marks it read.
    pub async fn get(&self, viewer: Actor, request_id: Uuid) -> AppResult<RequestWithLines> {
        let mut conn = self.db.acquire().await?;
        let request = sqlx::query_as::<_, Request>(&format!(
            "SELECT {} FROM warehouse_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(WarehouseError::request_not_found)?;

        viewer.ensure_visible(&request)?;

        let mut detail = load_detail(&mut conn, request).await?;
        drop(conn);

        if self.mark_read(viewer.user_id, request_id).await? {
            detail.request.requester_read = true;
        }
        Ok(detail)
    }

    /// Requests newest first; non-managers only ever see their own
    pub async fn list(
        &self,
        viewer: Actor,
        filter: &RequestFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Request>> {
        let requester_id = if viewer.can_manage {
            filter.requester_id
        } else {
            Some(viewer.user_id)
        };

        const WHERE: &str = r#"
            WHERE ($1::request_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR requester_id = $2)
              AND ($3::uuid IS NULL OR site_id = $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM warehouse_requests {}",
            WHERE
        ))
        .bind(filter.status)
        .bind(requester_id)
        .bind(filter.site_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, Request>(&format!(
            "SELECT {} FROM warehouse_requests {} ORDER BY created_at DESC LIMIT $4 OFFSET $5",
            REQUEST_COLUMNS, WHERE
        ))
        .bind(filter.status)
        .bind(requester_id)
        .bind(filter.site_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(rows, pagination, total.max(0) as u64))
    }
}

async fn ensure_site(conn: &mut PgConnection, site_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM sites WHERE id = $1 AND is_active = true)",
    )
    .bind(site_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::NotFound("Site".to_string()));
    }
    Ok(())
}

async fn lock_request(conn: &mut PgConnection, request_id: Uuid) -> AppResult<Request> {
    let request = sqlx::query_as::<_, Request>(&format!(
        "SELECT {} FROM warehouse_requests WHERE id = $1 FOR UPDATE",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(WarehouseError::request_not_found)?;

    Ok(request)
}

async fn lock_lines(conn: &mut PgConnection, request_id: Uuid) -> AppResult<Vec<RequestLine>> {
    let lines = sqlx::query_as::<_, RequestLine>(
        r#"
        SELECT id, request_id, item_id, requested_quantity, fulfilled_quantity
        FROM warehouse_request_lines
        WHERE request_id = $1
        ORDER BY position
        FOR UPDATE
        "#,
    )
    .bind(request_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

async fn insert_lines(conn: &mut PgConnection, request_id: Uuid, lines: &[LineInput]) -> AppResult<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO warehouse_request_lines (request_id, item_id, requested_quantity, position)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(request_id)
        .bind(line.item_id)
        .bind(line.quantity)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn save_request(conn: &mut PgConnection, request: &Request) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE warehouse_requests
        SET status = $2, response = $3, handled_by = $4, handled_at = $5,
            requester_read = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(request.id)
    .bind(request.status)
    .bind(&request.response)
    .bind(request.handled_by)
    .bind(request.handled_at)
    .bind(request.requester_read)
    .bind(request.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn load_detail(conn: &mut PgConnection, request: Request) -> AppResult<RequestWithLines> {
    let lines = sqlx::query_as::<_, RequestLineView>(
        r#"
        SELECT l.id, l.item_id, i.code AS item_code, i.name AS item_name, i.unit,
               l.requested_quantity, l.fulfilled_quantity, i.available_quantity
        FROM warehouse_request_lines l
        JOIN items i ON i.id = l.item_id
        WHERE l.request_id = $1
        ORDER BY l.position
        "#,
    )
    .bind(request.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(RequestWithLines { request, lines })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_of(requester_id: Uuid) -> Request {
        Request {
            id: Uuid::new_v4(),
            requester_id,
            site_id: None,
            priority: Priority::High,
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

    #[test]
    fn stranger_sees_not_found_instead_of_forbidden() {
        let request = request_of(Uuid::new_v4());
        let stranger = Actor {
            user_id: Uuid::new_v4(),
            can_manage: false,
        };
        assert!(matches!(
            stranger.ensure_visible(&request),
            Err(AppError::Warehouse(WarehouseError::NotFound { entity: "Request" }))
        ));
    }

    #[test]
    fn owner_and_manager_see_the_request() {
        let owner = Uuid::new_v4();
        let request = request_of(owner);
        let as_owner = Actor {
            user_id: owner,
            can_manage: false,
        };
        let as_manager = Actor {
            user_id: Uuid::new_v4(),
            can_manage: true,
        };
        assert!(as_owner.ensure_visible(&request).is_ok());
        assert!(as_manager.ensure_visible(&request).is_ok());
    }

    #[test]
    fn mark_read_is_audited_against_the_request() {
        let reader = Uuid::new_v4();
        let request_id = Uuid::new_v4();
        let entry = mark_read_entry(reader, request_id);
        assert_eq!(entry.action, "request.mark_read");
        assert_eq!(entry.entity_type, "warehouse_request");
        assert_eq!(entry.actor_id, Some(reader));
        assert_eq!(entry.entity_id, Some(request_id));
    }
}
