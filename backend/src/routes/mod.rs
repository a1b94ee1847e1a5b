//! Route definitions for the warehouse back office API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login is public)
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes
        .nest("/items", item_routes(state.clone()))
        .nest("/categories", category_routes(state.clone()))
        .nest("/movements", movement_routes(state.clone()))
        .nest("/requests", request_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/dashboard", dashboard_routes(state.clone()))
        .nest("/reports", report_routes(state.clone()))
        .nest("/audit", audit_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .merge(protected)
}

/// Item catalogue and per-item stock operations (protected)
fn item_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/grouped", get(handlers::list_items_grouped))
        .route("/low-stock", get(handlers::list_low_stock))
        .route("/:item_id", get(handlers::get_item).put(handlers::update_item))
        .route("/:item_id/toggle-active", post(handlers::toggle_item_active))
        .route("/:item_id/toggle-favorite", post(handlers::toggle_item_favorite))
        // Stock
        .route("/:item_id/load", post(handlers::load_stock))
        .route("/:item_id/unload", post(handlers::unload_stock))
        .route("/:item_id/adjust", post(handlers::adjust_stock))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Category registry routes (protected)
fn category_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_categories).post(handlers::create_category))
        .route(
            "/:category_id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route("/:category_id/toggle-active", post(handlers::toggle_category_active))
        .route("/:category_id/reorder", post(handlers::reorder_category))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Movement history (protected)
fn movement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_movements))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Supply request workflow (protected)
fn request_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_requests).post(handlers::submit_request))
        .route("/:request_id", get(handlers::get_request))
        .route("/:request_id/lines", put(handlers::revise_request))
        .route("/:request_id/approve", post(handlers::approve_request))
        .route("/:request_id/reject", post(handlers::reject_request))
        .route("/:request_id/fulfill", post(handlers::fulfill_request))
        .route("/:request_id/read", post(handlers::mark_request_read))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// In-app notifications (protected)
fn notification_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_notifications))
        .route("/unread-count", get(handlers::get_unread_count))
        .route("/mark-all-read", post(handlers::mark_all_as_read))
        .route("/:notification_id/read", post(handlers::mark_as_read))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Dashboard routes (protected)
fn dashboard_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_dashboard))
        .route("/badges", get(handlers::get_badges))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Reports, JSON or CSV (protected)
fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stock", get(handlers::get_stock_report))
        .route("/movements", get(handlers::get_movement_report))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Audit trail (protected, admin only)
fn audit_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_audit_logs))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
