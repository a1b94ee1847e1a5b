//! HTTP handlers

mod audit;
mod auth;
mod category;
mod dashboard;
mod health;
mod item;
mod notification;
mod reporting;
mod request;
mod stock;

pub use audit::*;
pub use auth::*;
pub use category::*;
pub use dashboard::*;
pub use health::*;
pub use item::*;
pub use notification::*;
pub use reporting::*;
pub use request::*;
pub use stock::*;

use shared::badges;

use crate::AppState;

/// Drop cached counters after a stock change
pub(crate) fn invalidate_stock_badges(state: &AppState) {
    state.badges.invalidate(badges::LOW_STOCK);
    // low-stock notices may have gone out
    state.badges.invalidate_prefix(badges::UNREAD_NOTIFICATIONS_PREFIX);
}

/// Drop cached counters after a request transition
pub(crate) fn invalidate_request_badges(state: &AppState, requester_id: uuid::Uuid) {
    state
        .badges
        .invalidate_all(badges::after_request_change(requester_id));
    state.badges.invalidate_prefix(badges::UNREAD_NOTIFICATIONS_PREFIX);
}
