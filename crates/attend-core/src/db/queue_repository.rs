//! Check-in queue repository implementation

use crate::config::QueuePolicy;
use crate::error::Result;
use crate::models::{CheckInEvent, FailedCheckIn, LocalId, PendingCheckIn};
use crate::util::unix_millis_now;
use libsql::Connection;
use serde::de::DeserializeOwned;

use super::kv_store::LibSqlKvStore;

/// Key holding the active queue (JSON array, most recent first)
pub const ACTIVE_QUEUE_KEY: &str = "attendance_queue";
/// Key holding the failed-items record (JSON array, oldest failure first)
pub const FAILED_QUEUE_KEY: &str = "attendance_failed_queue";

/// Result of recording one failed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Still in the active queue with the new count
    Retained { retry_count: u32 },
    /// Reached the ceiling and now lives in the failed record
    MovedToFailed { retry_count: u32 },
    /// No active item with that id
    NotFound,
}

/// Trait for check-in queue storage operations (async)
///
/// Every method takes the caller's notion of "now" so retention can be
/// evaluated deterministically.
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Store a new item at the front of the active queue
    async fn enqueue(&self, event: CheckInEvent, now_ms: i64) -> Result<PendingCheckIn>;

    /// Active items after evicting those past the retention window
    async fn list_active(&self, now_ms: i64) -> Result<Vec<PendingCheckIn>>;

    /// Delete an active item, returning whether it existed
    async fn remove(&self, local_id: &LocalId) -> Result<bool>;

    /// Record a failed attempt; moves the item to the failed record at the ceiling
    async fn increment_retry(
        &self,
        local_id: &LocalId,
        last_error: Option<&str>,
        now_ms: i64,
    ) -> Result<RetryOutcome>;

    /// Items that exhausted their retries
    async fn list_failed(&self) -> Result<Vec<FailedCheckIn>>;

    /// Drop the active queue (the failed record is kept)
    async fn clear_active(&self) -> Result<()>;
}

/// libSQL implementation of `QueueRepository` over the `kv_store` table
pub struct LibSqlQueueRepository<'a> {
    store: LibSqlKvStore<'a>,
    policy: QueuePolicy,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection and default policy
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_policy(conn, QueuePolicy::default())
    }

    /// Create a new repository with an explicit retry/retention policy
    pub const fn with_policy(conn: &'a Connection, policy: QueuePolicy) -> Self {
        Self {
            store: LibSqlKvStore::new(conn),
            policy,
        }
    }

    async fn load_active(&self) -> Result<Vec<PendingCheckIn>> {
        self.load_list(ACTIVE_QUEUE_KEY).await
    }

    async fn save_active(&self, items: &[PendingCheckIn]) -> Result<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(ACTIVE_QUEUE_KEY, &raw).await
    }

    async fn load_failed(&self) -> Result<Vec<FailedCheckIn>> {
        self.load_list(FAILED_QUEUE_KEY).await
    }

    /// Decode a stored list. An undecodable value is moved to
    /// `<key>.corrupt-<unix_ms>` and the key restarts empty.
    async fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(error) => {
                let side_key = format!("{key}.corrupt-{}", unix_millis_now());
                self.store
                    .set_many(&[(side_key.as_str(), raw.as_str()), (key, "[]")])
                    .await?;
                tracing::error!(
                    key,
                    side_key = %side_key,
                    "Stored queue could not be decoded, starting empty: {error}"
                );
                Ok(Vec::new())
            }
        }
    }

    fn is_stale(&self, item: &PendingCheckIn, now_ms: i64) -> bool {
        item.age_ms(now_ms) >= self.policy.retention_ms()
    }
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn enqueue(&self, event: CheckInEvent, now_ms: i64) -> Result<PendingCheckIn> {
        let mut items = self.list_active(now_ms).await?;
        let item = PendingCheckIn::from_event(event, now_ms);
        items.insert(0, item.clone());
        self.save_active(&items).await?;

        tracing::debug!(
            local_id = %item.local_id,
            queue_len = items.len(),
            "Enqueued check-in"
        );
        Ok(item)
    }

    async fn list_active(&self, now_ms: i64) -> Result<Vec<PendingCheckIn>> {
        let items = self.load_active().await?;
        let before = items.len();
        let kept: Vec<PendingCheckIn> = items
            .into_iter()
            .filter(|item| !self.is_stale(item, now_ms))
            .collect();

        let evicted = before - kept.len();
        if evicted > 0 {
            self.save_active(&kept).await?;
            tracing::warn!(evicted, "Dropped check-ins older than the retention window");
        }

        Ok(kept)
    }

    async fn remove(&self, local_id: &LocalId) -> Result<bool> {
        let mut items = self.load_active().await?;
        let before = items.len();
        items.retain(|item| item.local_id != *local_id);

        if items.len() == before {
            return Ok(false);
        }

        self.save_active(&items).await?;
        Ok(true)
    }

    async fn increment_retry(
        &self,
        local_id: &LocalId,
        last_error: Option<&str>,
        now_ms: i64,
    ) -> Result<RetryOutcome> {
        let mut items = self.load_active().await?;
        let Some(index) = items.iter().position(|item| item.local_id == *local_id) else {
            return Ok(RetryOutcome::NotFound);
        };

        let item = &mut items[index];
        item.retry_count = item.retry_count.saturating_add(1);
        if let Some(message) = last_error {
            item.last_error = Some(message.to_string());
        }
        let retry_count = item.retry_count;

        if retry_count < self.policy.max_retries {
            self.save_active(&items).await?;
            return Ok(RetryOutcome::Retained { retry_count });
        }

        let exhausted = items.remove(index);
        let mut failed = self.load_failed().await?;
        failed.push(FailedCheckIn {
            item: exhausted,
            failed_at: now_ms,
        });

        let active_raw = serde_json::to_string(&items)?;
        let failed_raw = serde_json::to_string(&failed)?;
        self.store
            .set_many(&[
                (ACTIVE_QUEUE_KEY, active_raw.as_str()),
                (FAILED_QUEUE_KEY, failed_raw.as_str()),
            ])
            .await?;

        tracing::error!(
            local_id = %local_id,
            retry_count,
            "Check-in exceeded retry limit, moved to failed queue"
        );
        Ok(RetryOutcome::MovedToFailed { retry_count })
    }

    async fn list_failed(&self) -> Result<Vec<FailedCheckIn>> {
        self.load_failed().await
    }

    async fn clear_active(&self) -> Result<()> {
        self.store.remove(ACTIVE_QUEUE_KEY).await
    }
}
