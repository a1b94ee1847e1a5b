//! HTTP handlers for the item catalogue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{permissions::caps, Item, ItemSummary};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::invalidate_stock_badges;
use crate::middleware::CurrentUser;
use crate::services::item::{CreateItemInput, ItemFilter, ItemGroup, UpdateItemInput};
use crate::services::ItemService;
use crate::AppState;

/// List items; inactive ones only for inventory managers
pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(mut filter): Query<ItemFilter>,
) -> AppResult<Json<Vec<ItemSummary>>> {
    current_user.0.require(caps::WAREHOUSE_VIEW)?;
    if !current_user.0.can(caps::INVENTORY_MANAGE) {
        filter.include_inactive = Some(false);
    }

    let items = ItemService::new(state.db).list(&filter).await?;
    Ok(Json(items))
}

/// Active items grouped by category, for the request form
pub async fn list_items_grouped(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<ItemGroup>>> {
    current_user.0.require(caps::WAREHOUSE_VIEW)?;
    let groups = ItemService::new(state.db).grouped().await?;
    Ok(Json(groups))
}

/// Items at or below their minimum threshold
pub async fn list_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<ItemSummary>>> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;
    let items = ItemService::new(state.db).low_stock().await?;
    Ok(Json(items))
}

pub async fn get_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    current_user.0.require(caps::WAREHOUSE_VIEW)?;
    let item = ItemService::new(state.db).get(item_id).await?;
    Ok(Json(item))
}

pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<Item>)> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let item = ItemService::new(state.db.clone())
        .create(current_user.0.user_id, input)
        .await?;
    invalidate_stock_badges(&state);
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<Item>> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let item = ItemService::new(state.db.clone())
        .update(current_user.0.user_id, item_id, input)
        .await?;
    invalidate_stock_badges(&state);
    Ok(Json(item))
}

/// Flip the active flag
pub async fn toggle_item_active(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let item = ItemService::new(state.db.clone())
        .toggle_active(current_user.0.user_id, item_id)
        .await?;
    invalidate_stock_badges(&state);
    Ok(Json(item))
}

/// Flip the favorite flag
pub async fn toggle_item_favorite(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    current_user.0.require(caps::INVENTORY_MANAGE)?;

    let item = ItemService::new(state.db)
        .toggle_favorite(current_user.0.user_id, item_id)
        .await?;
    Ok(Json(item))
}
