//! Notification dispatcher for in-app notices
//!
//! Supports:
//! - Addressing a single user, every user with a role, or every user holding a capability
//! - Fire-and-forget delivery after the triggering transaction commits
//! - In-app notification listing and read tracking

use serde_json::json;
use shared::permissions::{has_capability, Role};
use shared::{AuditEntry, Notification, NotificationKind, Recipient};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::audit;

/// Notification service for managing notifications
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
}

/// A notice waiting to be delivered once its transaction has committed
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
    /// Never delivered to this user, typically the actor
    pub except: Option<Uuid>,
}

impl Notice {
    pub fn new(recipient: Recipient, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            recipient,
            kind,
            message: message.into(),
            link: None,
            except: None,
        }
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn except(mut self, user_id: Uuid) -> Self {
        self.except = Some(user_id);
        self
    }
}

/// Active user ids addressed by `recipient`, given `(id, stored role)` pairs
///
/// Stored roles are parsed here; a row whose role does not parse only
/// receives notices addressed to it by id.
pub fn resolve_recipients(
    users: &[(Uuid, String)],
    recipient: &Recipient,
    except: Option<Uuid>,
) -> Vec<Uuid> {
    users
        .iter()
        .filter(|(id, _)| Some(*id) != except)
        .filter(|(id, role)| {
            let parsed = role.parse::<Role>().ok();
            match recipient {
                Recipient::User(target) => id == target,
                Recipient::Role(target) => parsed == Some(*target),
                Recipient::Capability(capability) => has_capability(parsed, capability),
            }
        })
        .map(|(id, _)| *id)
        .collect()
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Store one notice per addressed user; returns how many rows were written
    pub async fn notify(&self, notice: &Notice) -> AppResult<u64> {
        let users = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, role FROM users WHERE is_active = true",
        )
        .fetch_all(&self.db)
        .await?;

        let targets = resolve_recipients(&users, &notice.recipient, notice.except);
        if targets.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, message, link)
            SELECT target, $2, $3, $4 FROM UNNEST($1::uuid[]) AS target
            "#,
        )
        .bind(&targets)
        .bind(notice.kind.as_str())
        .bind(&notice.message)
        .bind(&notice.link)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deliver notices, logging failures instead of returning them
    pub async fn dispatch(&self, notices: Vec<Notice>) {
        for notice in notices {
            match self.notify(&notice).await {
                Ok(count) => tracing::debug!(kind = notice.kind.as_str(), count, "Notification sent"),
                Err(e) => tracing::warn!(
                    kind = notice.kind.as_str(),
                    "Failed to deliver notification: {}",
                    e
                ),
            }
        }
    }

    // ========================================================================
    // In-App Notifications
    // ========================================================================

    /// Get in-app notifications, newest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, kind, message, link, is_read, created_at, read_at
            FROM notifications
            WHERE user_id = $1 AND ($2 = false OR is_read = false)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    /// Get unread notification count
    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Mark notification as read
    pub async fn mark_as_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification".to_string()));
        }

        audit::record(&mut *tx, &read_entry(user_id, Some(notification_id), 1)).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Mark all notifications as read
    pub async fn mark_all_as_read(&self, user_id: Uuid) -> AppResult<u64> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, read_at = NOW()
            WHERE user_id = $1 AND is_read = false
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let count = result.rows_affected();
        if count == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        audit::record(&mut *tx, &read_entry(user_id, None, count)).await?;
        tx.commit().await?;

        Ok(count)
    }
}

/// Audit row for a read mark; `None` covers every unread notification of the user
fn read_entry(user_id: Uuid, notification_id: Option<Uuid>, count: u64) -> AuditEntry {
    match notification_id {
        Some(id) => AuditEntry::new(user_id, "notification.mark_read", "notification").entity(id),
        None => AuditEntry::new(user_id, "notification.mark_all_read", "notification")
            .details(json!({ "count": count })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::permissions::caps;

    fn users() -> Vec<(Uuid, String)> {
        vec![
            (Uuid::new_v4(), "admin".to_string()),
            (Uuid::new_v4(), "UserRole.MANAGER".to_string()),
            (Uuid::new_v4(), "caposquadra".to_string()),
            (Uuid::new_v4(), "guest".to_string()),
        ]
    }

    #[test]
    fn capability_reaches_every_role_that_holds_it() {
        let users = users();
        let targets = resolve_recipients(
            &users,
            &Recipient::Capability(caps::REQUESTS_MANAGE.to_string()),
            None,
        );
        assert_eq!(targets, vec![users[0].0, users[1].0]);
    }

    #[test]
    fn except_skips_the_actor() {
        let users = users();
        let targets = resolve_recipients(
            &users,
            &Recipient::Capability(caps::REQUESTS_MANAGE.to_string()),
            Some(users[1].0),
        );
        assert_eq!(targets, vec![users[0].0]);
    }

    #[test]
    fn role_matches_exactly() {
        let users = users();
        let targets = resolve_recipients(&users, &Recipient::Role(Role::Manager), None);
        assert_eq!(targets, vec![users[1].0]);
    }

    #[test]
    fn unparseable_role_only_reached_by_id() {
        let users = users();
        let guest = users[3].0;
        assert!(!resolve_recipients(
            &users,
            &Recipient::Capability(caps::DASHBOARD_VIEW.to_string()),
            None
        )
        .contains(&guest));
        assert_eq!(
            resolve_recipients(&users, &Recipient::User(guest), None),
            vec![guest]
        );
    }

    #[test]
    fn single_read_mark_is_audited_per_notification() {
        let user = Uuid::new_v4();
        let id = Uuid::new_v4();
        let entry = read_entry(user, Some(id), 1);
        assert_eq!(entry.action, "notification.mark_read");
        assert_eq!(entry.entity_id, Some(id));
        assert_eq!(entry.actor_id, Some(user));
    }

    #[test]
    fn bulk_read_mark_records_the_count() {
        let entry = read_entry(Uuid::new_v4(), None, 4);
        assert_eq!(entry.action, "notification.mark_all_read");
        assert_eq!(entry.entity_id, None);
        assert_eq!(entry.details, Some(json!({ "count": 4 })));
    }
}
