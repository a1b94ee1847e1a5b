//! HTTP handlers for the category registry

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{permissions::caps, Category, CategoryView, ReorderDirection};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::category::{CategoryQuery, CreateCategoryInput, UpdateCategoryInput};
use crate::services::CategoryService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub direction: ReorderDirection,
}

/// Categories in display order
pub async fn list_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(mut query): Query<CategoryQuery>,
) -> AppResult<Json<Vec<CategoryView>>> {
    current_user.0.require(caps::WAREHOUSE_VIEW)?;
    if !current_user.0.can(caps::CATEGORIES_MANAGE) {
        query.include_inactive = false;
    }

    let categories = CategoryService::new(state.db).list(&query).await?;
    Ok(Json(categories))
}

pub async fn get_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    current_user.0.require(caps::WAREHOUSE_VIEW)?;
    let category = CategoryService::new(state.db).get(category_id).await?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    current_user.0.require(caps::CATEGORIES_MANAGE)?;

    let category = CategoryService::new(state.db)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
    Json(input): Json<UpdateCategoryInput>,
) -> AppResult<Json<Category>> {
    current_user.0.require(caps::CATEGORIES_MANAGE)?;

    let category = CategoryService::new(state.db)
        .update(current_user.0.user_id, category_id, input)
        .await?;
    Ok(Json(category))
}

/// Flip the active flag
pub async fn toggle_category_active(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    current_user.0.require(caps::CATEGORIES_MANAGE)?;

    let category = CategoryService::new(state.db)
        .toggle_active(current_user.0.user_id, category_id)
        .await?;
    Ok(Json(category))
}

/// Soft delete: the row stays and its items fall back to the uncategorized bucket
pub async fn delete_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    current_user.0.require(caps::CATEGORIES_MANAGE)?;

    let category = CategoryService::new(state.db)
        .disable(current_user.0.user_id, category_id)
        .await?;
    Ok(Json(category))
}

/// Move a category one slot up or down
pub async fn reorder_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
    Json(body): Json<ReorderRequest>,
) -> AppResult<Json<Vec<CategoryView>>> {
    current_user.0.require(caps::CATEGORIES_MANAGE)?;

    let categories = CategoryService::new(state.db)
        .reorder(current_user.0.user_id, category_id, body.direction)
        .await?;
    Ok(Json(categories))
}
