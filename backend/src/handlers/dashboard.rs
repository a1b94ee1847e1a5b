//! Dashboard handlers

use axum::{extract::State, Json};
use shared::permissions::caps;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::badge::BadgeCounts;
use crate::services::reporting::DashboardMetrics;
use crate::services::{BadgeService, ReportingService};
use crate::AppState;

/// Navigation badge counters, served from the TTL cache
pub async fn get_badges(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<BadgeCounts>> {
    current_user.0.require(caps::DASHBOARD_VIEW)?;

    let counts = BadgeService::new(state.db, state.badges)
        .counts_for(&current_user.0)
        .await?;
    Ok(Json(counts))
}

/// Warehouse totals for managers
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardMetrics>> {
    current_user.0.require(caps::DASHBOARD_VIEW)?;
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let metrics = ReportingService::new(state.db).dashboard().await?;
    Ok(Json(metrics))
}
