//! HTTP handlers for stock movements

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::{permissions::caps, Movement, MovementView, PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::invalidate_stock_badges;
use crate::middleware::CurrentUser;
use crate::services::stock::{AdjustInput, LoadInput, MovementFilter, UnloadInput};
use crate::services::StockService;
use crate::AppState;

/// Result of an adjustment; `movement` is absent when nothing changed
#[derive(Debug, Serialize)]
pub struct AdjustResponse {
    pub changed: bool,
    pub movement: Option<Movement>,
}

/// Add stock to an item
pub async fn load_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<LoadInput>,
) -> AppResult<(StatusCode, Json<Movement>)> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let movement = StockService::new(state.db.clone())
        .load(current_user.0.user_id, item_id, input)
        .await?;
    invalidate_stock_badges(&state);
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Take stock out of an item
pub async fn unload_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UnloadInput>,
) -> AppResult<(StatusCode, Json<Movement>)> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let movement = StockService::new(state.db.clone())
        .unload(current_user.0.user_id, item_id, input)
        .await?;
    invalidate_stock_badges(&state);
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Set availability to a counted value
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<AdjustInput>,
) -> AppResult<Json<AdjustResponse>> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let movement = StockService::new(state.db.clone())
        .adjust(current_user.0.user_id, item_id, input)
        .await?;
    if movement.is_some() {
        invalidate_stock_badges(&state);
    }
    Ok(Json(AdjustResponse {
        changed: movement.is_some(),
        movement,
    }))
}

/// Movement history
pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<MovementView>>> {
    current_user.0.require(caps::MOVEMENTS_VIEW)?;

    let page = StockService::new(state.db)
        .list_movements(&filter, pagination)
        .await?;
    Ok(Json(page))
}
