//! Cache keys for dashboard badge counters
//!
//! Per-user counters share a prefix so a single `invalidate_prefix` clears
//! them for everyone after a bulk change.

use uuid::Uuid;

pub const PENDING_REQUESTS: &str = "pending_requests";
pub const LOW_STOCK: &str = "low_stock";
pub const UNREAD_NOTIFICATIONS_PREFIX: &str = "unread_notifications:";
pub const UNREAD_RESPONSES_PREFIX: &str = "unread_responses:";

pub fn unread_notifications(user_id: Uuid) -> String {
    format!("{}{}", UNREAD_NOTIFICATIONS_PREFIX, user_id)
}

pub fn unread_responses(user_id: Uuid) -> String {
    format!("{}{}", UNREAD_RESPONSES_PREFIX, user_id)
}

/// Keys touched when a request moves, for the request's owner
pub fn after_request_change(requester_id: Uuid) -> Vec<String> {
    vec![
        PENDING_REQUESTS.to_string(),
        LOW_STOCK.to_string(),
        unread_responses(requester_id),
    ]
}
