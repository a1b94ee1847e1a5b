//! HTTP handlers for supply requests

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::{permissions::caps, PaginatedResponse, Pagination, Request, RequestWithLines};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::{invalidate_request_badges, invalidate_stock_badges};
use crate::middleware::{AuthUser, CurrentUser};
use crate::services::request::{
    Actor, FulfillInput, RequestFilter, ResponseInput, ReviseRequestInput, SubmitRequestInput,
};
use crate::services::RequestService;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub changed: bool,
}

fn actor(user: &AuthUser) -> Actor {
    Actor {
        user_id: user.user_id,
        can_manage: user.can(caps::REQUESTS_MANAGE),
    }
}

/// Requests visible to the caller
pub async fn list_requests(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<RequestFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Request>>> {
    current_user.0.require(caps::REQUESTS_VIEW_OWN)?;

    let page = RequestService::new(state.db)
        .list(actor(&current_user.0), &filter, pagination)
        .await?;
    Ok(Json(page))
}

/// One request; opening an answered request as its requester marks it read
pub async fn get_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<RequestWithLines>> {
    current_user.0.require(caps::REQUESTS_VIEW_OWN)?;

    let detail = RequestService::new(state.db.clone())
        .get(actor(&current_user.0), request_id)
        .await?;
    if detail.request.requester_id == current_user.0.user_id {
        state
            .badges
            .invalidate(&shared::badges::unread_responses(current_user.0.user_id));
    }
    Ok(Json(detail))
}

pub async fn submit_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SubmitRequestInput>,
) -> AppResult<(StatusCode, Json<RequestWithLines>)> {
    current_user.0.require(caps::REQUESTS_CREATE)?;

    let detail = RequestService::new(state.db.clone())
        .submit(current_user.0.user_id, input)
        .await?;
    invalidate_request_badges(&state, detail.request.requester_id);
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Replace the lines of a pending request
pub async fn revise_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
    Json(input): Json<ReviseRequestInput>,
) -> AppResult<Json<RequestWithLines>> {
    current_user.0.require(caps::REQUESTS_CREATE)?;

    let detail = RequestService::new(state.db)
        .revise(actor(&current_user.0), request_id, input)
        .await?;
    Ok(Json(detail))
}

pub async fn approve_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
    input: Option<Json<ResponseInput>>,
) -> AppResult<Json<RequestWithLines>> {
    current_user.0.require(caps::REQUESTS_MANAGE)?;

    let input = input.map(|Json(body)| body).unwrap_or_default();
    let detail = RequestService::new(state.db.clone())
        .approve(current_user.0.user_id, request_id, input)
        .await?;
    invalidate_request_badges(&state, detail.request.requester_id);
    Ok(Json(detail))
}

pub async fn reject_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
    input: Option<Json<ResponseInput>>,
) -> AppResult<Json<RequestWithLines>> {
    current_user.0.require(caps::REQUESTS_MANAGE)?;

    let input = input.map(|Json(body)| body).unwrap_or_default();
    let detail = RequestService::new(state.db.clone())
        .reject(current_user.0.user_id, request_id, input)
        .await?;
    invalidate_request_badges(&state, detail.request.requester_id);
    Ok(Json(detail))
}

/// Hand out stock; an empty body fulfills every residual
pub async fn fulfill_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
    input: Option<Json<FulfillInput>>,
) -> AppResult<Json<RequestWithLines>> {
    current_user.0.require(caps::REQUESTS_MANAGE)?;

    let input = input.map(|Json(body)| body).unwrap_or_default();
    let detail = RequestService::new(state.db.clone())
        .fulfill(current_user.0.user_id, request_id, input)
        .await?;
    invalidate_request_badges(&state, detail.request.requester_id);
    invalidate_stock_badges(&state);
    Ok(Json(detail))
}

/// Requester acknowledges the answer
pub async fn mark_request_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<MarkReadResponse>> {
    let user_id = current_user.0.user_id;
    let changed = RequestService::new(state.db.clone())
        .mark_read(user_id, request_id)
        .await?;
    if changed {
        state.badges.invalidate(&shared::badges::unread_responses(user_id));
    }
    Ok(Json(MarkReadResponse { changed }))
}
