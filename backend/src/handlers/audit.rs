//! Audit trail handlers (admin only)

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{permissions::caps, AuditLog, PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::audit::AuditFilter;
use crate::services::AuditService;
use crate::AppState;

pub async fn list_audit_logs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<AuditFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<AuditLog>>> {
    current_user.0.require(caps::AUDIT_VIEW)?;

    let page = AuditService::new(state.db).list(&filter, pagination).await?;
    Ok(Json(page))
}
