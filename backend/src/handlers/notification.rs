//! HTTP handlers for the current user's notifications

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{badges, permissions::caps, Notification};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::NotificationService;
use crate::AppState;

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// Get in-app notifications
pub async fn get_notifications(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    current_user.0.require(caps::NOTIFICATIONS_VIEW)?;

    let service = NotificationService::new(state.db);
    let notifications = service
        .list_for_user(
            current_user.0.user_id,
            query.unread_only.unwrap_or(false),
            query.limit.unwrap_or(50),
        )
        .await?;
    Ok(Json(notifications))
}

/// Get unread notification count
pub async fn get_unread_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UnreadCountResponse>> {
    current_user.0.require(caps::NOTIFICATIONS_VIEW)?;

    let service = NotificationService::new(state.db);
    let count = service.unread_count(current_user.0.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Mark one notification as read
pub async fn mark_as_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let user_id = current_user.0.user_id;
    NotificationService::new(state.db.clone())
        .mark_as_read(user_id, notification_id)
        .await?;
    state.badges.invalidate(&badges::unread_notifications(user_id));
    Ok(Json(()))
}

/// Mark every notification as read
pub async fn mark_all_as_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let user_id = current_user.0.user_id;
    let updated = NotificationService::new(state.db.clone())
        .mark_all_as_read(user_id)
        .await?;
    state.badges.invalidate(&badges::unread_notifications(user_id));
    Ok(Json(MarkAllReadResponse { updated }))
}
