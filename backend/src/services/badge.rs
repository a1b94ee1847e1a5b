//! Dashboard badge counters with a short-lived in-process cache
//!
//! The cache is owned by `AppState` and cloned into handlers. Counts are
//! advisory: nothing reads them for authorization or stock decisions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use shared::{badges, permissions::caps};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: i64,
    expires_at: Instant,
}

/// TTL map of badge counts keyed by [`shared::badges`] keys
#[derive(Clone)]
pub struct BadgeCache {
    store: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl BadgeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned counter map is still a valid counter map
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        let mut store = self.lock();
        match store.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value),
            Some(_) => {
                store.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: i64) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn invalidate_prefix(&self, prefix: &str) {
        self.lock().retain(|key, _| !key.starts_with(prefix));
    }

    pub fn invalidate_all<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut store = self.lock();
        for key in keys {
            store.remove(key.as_ref());
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Cached value for `key`, computing and storing it on a miss
    pub async fn get_or_load<F, Fut>(&self, key: String, load: F) -> AppResult<i64>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = AppResult<i64>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = load().await?;
        self.set(key, value);
        Ok(value)
    }
}

/// Badge counts shown in the navigation bar
#[derive(Debug, Clone, Serialize, Default)]
pub struct BadgeCounts {
    /// Present only for users who handle requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_requests: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_stock: Option<i64>,
    pub unread_notifications: i64,
    pub unread_responses: i64,
}

/// Badge count queries
#[derive(Clone)]
pub struct BadgeService {
    db: PgPool,
    cache: BadgeCache,
}

impl BadgeService {
    pub fn new(db: PgPool, cache: BadgeCache) -> Self {
        Self { db, cache }
    }

    /// Counts visible to `user`; managers additionally see warehouse queues
    pub async fn counts_for(&self, user: &AuthUser) -> AppResult<BadgeCounts> {
        let mut counts = BadgeCounts {
            unread_notifications: self.unread_notifications(user.user_id).await?,
            unread_responses: self.unread_responses(user.user_id).await?,
            ..Default::default()
        };

        if user.can(caps::REQUESTS_MANAGE) {
            counts.pending_requests = Some(self.pending_requests().await?);
        }
        if user.can(caps::INVENTORY_MANAGE) {
            counts.low_stock = Some(self.low_stock().await?);
        }

        Ok(counts)
    }

    async fn pending_requests(&self) -> AppResult<i64> {
        let db = self.db.clone();
        self.cache
            .get_or_load(badges::PENDING_REQUESTS.to_string(), || async move {
                let count = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM warehouse_requests WHERE status = 'pending'",
                )
                .fetch_one(&db)
                .await?;
                Ok(count)
            })
            .await
    }

    async fn low_stock(&self) -> AppResult<i64> {
        let db = self.db.clone();
        self.cache
            .get_or_load(badges::LOW_STOCK.to_string(), || async move {
                let count = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM items
                    WHERE is_active = true
                      AND min_quantity IS NOT NULL
                      AND available_quantity <= min_quantity
                    "#,
                )
                .fetch_one(&db)
                .await?;
                Ok(count)
            })
            .await
    }

    async fn unread_notifications(&self, user_id: Uuid) -> AppResult<i64> {
        let db = self.db.clone();
        self.cache
            .get_or_load(badges::unread_notifications(user_id), || async move {
                let count = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
                )
                .bind(user_id)
                .fetch_one(&db)
                .await?;
                Ok(count)
            })
            .await
    }

    async fn unread_responses(&self, user_id: Uuid) -> AppResult<i64> {
        let db = self.db.clone();
        self.cache
            .get_or_load(badges::unread_responses(user_id), || async move {
                let count = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM warehouse_requests
                    WHERE requester_id = $1
                      AND handled_at IS NOT NULL
                      AND requester_read = false
                    "#,
                )
                .bind(user_id)
                .fetch_one(&db)
                .await?;
                Ok(count)
            })
            .await
    }
}
