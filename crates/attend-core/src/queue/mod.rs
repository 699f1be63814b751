//! Persisted check-in queue shared by the capture flow and the sync orchestrator.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::QueuePolicy;
use crate::db::{Database, LibSqlQueueRepository, QueueRepository, RetryOutcome};
use crate::models::{CheckInEvent, FailedCheckIn, LocalId, PendingCheckIn};
use crate::util::unix_millis_now;
use crate::Result;

/// Durable queue of check-ins waiting for server confirmation.
///
/// Implementations must never fall back to memory-only storage: an `enqueue`
/// that returns `Ok` has reached durable storage.
pub trait CheckInQueue: Send + Sync {
    /// Store a new item at the front of the queue
    fn enqueue(&self, event: CheckInEvent) -> impl Future<Output = Result<LocalId>> + Send;

    /// Current items, most recent first, after retention eviction
    fn list(&self) -> impl Future<Output = Result<Vec<PendingCheckIn>>> + Send;

    /// Delete an item; unknown ids are a no-op
    fn remove(&self, local_id: &LocalId) -> impl Future<Output = Result<()>> + Send;

    /// Record a failed attempt for an item
    fn increment_retry(
        &self,
        local_id: &LocalId,
        last_error: Option<&str>,
    ) -> impl Future<Output = Result<RetryOutcome>> + Send;

    /// Size of the active queue
    fn count(&self) -> impl Future<Output = Result<usize>> + Send;
}

/// Thread-safe queue service over a local libSQL database.
#[derive(Clone)]
pub struct QueueService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    policy: QueuePolicy,
}

impl QueueService {
    /// Open a queue service backed by the database file at the given path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self::open_database(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
            policy: QueuePolicy::default(),
        })
    }

    /// Open an in-memory queue service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
            policy: QueuePolicy::default(),
        })
    }

    /// Replace the retry/retention policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: QueuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn open_database(db_path: &Path) -> Result<Database> {
        match Database::open(db_path).await {
            Ok(db) => Ok(db),
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Queue database at {} is unreadable: {}. Moving it aside and starting a new one.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_file(db_path)?;
                Database::open(db_path).await
            }
            Err(error) => Err(error),
        }
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    /// Rename the damaged file instead of deleting it, so queued check-ins can
    /// still be recovered by hand.
    fn quarantine_corrupted_db_file(db_path: &Path) -> Result<PathBuf> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let base_name = db_path
            .file_name()
            .map_or_else(|| "attend.db".into(), |name| name.to_string_lossy());
        let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

        if db_path.exists() {
            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted queue database from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        for suffix in ["-wal", "-shm"] {
            let sidecar = db_path.with_file_name(format!("{base_name}{suffix}"));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
        }

        Ok(backup_path)
    }

    /// Items that exhausted their retries, oldest failure first.
    pub async fn failed(&self) -> Result<Vec<FailedCheckIn>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::with_policy(db.connection(), self.policy);
        repo.list_failed().await
    }

    /// Drop every active item. The failed record is kept.
    pub async fn clear(&self) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::with_policy(db.connection(), self.policy);
        repo.clear_active().await?;
        tracing::info!("Cleared active check-in queue");
        Ok(())
    }
}

impl CheckInQueue for QueueService {
    async fn enqueue(&self, event: CheckInEvent) -> Result<LocalId> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::with_policy(db.connection(), self.policy);
        let item = repo
            .enqueue(event, unix_millis_now())
            .await
            .inspect_err(|error| {
                tracing::error!("Failed to persist check-in, it was not queued: {error}");
            })?;
        Ok(item.local_id)
    }

    async fn list(&self) -> Result<Vec<PendingCheckIn>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::with_policy(db.connection(), self.policy);
        repo.list_active(unix_millis_now()).await
    }

    async fn remove(&self, local_id: &LocalId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::with_policy(db.connection(), self.policy);
        if !repo.remove(local_id).await? {
            tracing::debug!(%local_id, "Check-in already removed from queue");
        }
        Ok(())
    }

    async fn increment_retry(
        &self,
        local_id: &LocalId,
        last_error: Option<&str>,
    ) -> Result<RetryOutcome> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::with_policy(db.connection(), self.policy);
        repo.increment_retry(local_id, last_error, unix_millis_now())
            .await
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, DeviceInfo};
    use pretty_assertions::assert_eq;

    fn event() -> CheckInEvent {
        CheckInEvent::capture(
            Coordinates::new(18.6793, 105.6818),
            DeviceInfo::current("test-device"),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_list_and_count() {
        let queue = QueueService::open_in_memory().await.unwrap();

        let first = queue.enqueue(event()).await.unwrap();
        let second = queue.enqueue(event()).await.unwrap();

        let items = queue.list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].local_id, second);
        assert_eq!(items[1].local_id, first);
        assert_eq!(queue.count().await.unwrap(), 2);
        assert!(items.iter().all(|item| item.retry_count == 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_count_equals_number_of_increments() {
        let queue = QueueService::open_in_memory().await.unwrap();
        let id = queue.enqueue(event()).await.unwrap();
        let key = queue.list().await.unwrap()[0].idempotency_key;

        for expected in 1..=2 {
            let outcome = queue.increment_retry(&id, Some("HTTP 502")).await.unwrap();
            assert_eq!(
                outcome,
                RetryOutcome::Retained {
                    retry_count: expected
                }
            );
        }

        let item = &queue.list().await.unwrap()[0];
        assert_eq!(item.retry_count, 2);
        assert_eq!(item.idempotency_key, key);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn third_failure_moves_item_to_failed_record() {
        let queue = QueueService::open_in_memory().await.unwrap();
        let id = queue.enqueue(event()).await.unwrap();

        for _ in 0..3 {
            queue.increment_retry(&id, Some("HTTP 500")).await.unwrap();
        }

        assert!(queue.list().await.unwrap().is_empty());
        let failed = queue.failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].item.local_id, id);
        assert_eq!(failed[0].item.retry_count, 3);
        assert_eq!(failed[0].item.last_error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remove_twice_is_a_no_op() {
        let queue = QueueService::open_in_memory().await.unwrap();
        let id = queue.enqueue(event()).await.unwrap();

        queue.remove(&id).await.unwrap();
        queue.remove(&id).await.unwrap();

        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_item_is_gone_from_next_list_and_not_failed() {
        let queue = QueueService::open_in_memory().await.unwrap();
        let eight_days_ago = unix_millis_now() - 8 * 24 * 60 * 60 * 1000;
        {
            let db = queue.db.lock().await;
            LibSqlQueueRepository::new(db.connection())
                .enqueue(event(), eight_days_ago)
                .await
                .unwrap();
        }
        let fresh = queue.enqueue(event()).await.unwrap();

        let items = queue.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].local_id, fresh);
        assert!(queue.failed().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_fails_when_storage_is_unavailable() {
        let queue = QueueService::open_in_memory().await.unwrap();
        {
            let db = queue.db.lock().await;
            db.connection()
                .execute("DROP TABLE kv_store", ())
                .await
                .unwrap();
        }

        assert!(queue.enqueue(event()).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_keeps_failed_items() {
        let queue = QueueService::open_in_memory().await.unwrap().with_policy(QueuePolicy {
            max_retries: 1,
            ..QueuePolicy::default()
        });
        let doomed = queue.enqueue(event()).await.unwrap();
        queue.increment_retry(&doomed, None).await.unwrap();
        queue.enqueue(event()).await.unwrap();

        queue.clear().await.unwrap();

        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(queue.failed().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("attend.db");

        let id = {
            let queue = QueueService::open_path(&db_path).await.unwrap();
            queue.enqueue(event()).await.unwrap()
        };

        let reopened = QueueService::open_path(&db_path).await.unwrap();
        let items = reopened.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].local_id, id);
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("attend.db");
        let wal_path = tmp.path().join("attend.db-wal");
        std::fs::write(&db_path, b"not sqlite").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();

        let backup = QueueService::quarantine_corrupted_db_file(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        assert!(backup.exists());
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("attend.db.corrupt-"));
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(QueueService::is_corrupted_db_error(&crate::Error::Database(
            "SQLite failure: file is not a database".to_string()
        )));
        assert!(!QueueService::is_corrupted_db_error(
            &crate::Error::InvalidInput("latitude out of range".to_string())
        ));
    }
}
