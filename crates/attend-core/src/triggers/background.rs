//! Periodic background wake.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::SubmissionClient;
use crate::queue::CheckInQueue;
use crate::sync::SyncOrchestrator;
use crate::{Error, Result};

/// What a wake reports back to the platform scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundFetchResult {
    /// Nothing was queued
    NoData,
    /// At least one check-in reached the server
    NewData,
    /// The wake could not run, or queued items were not delivered
    Failed,
}

/// Whether the platform lets us run in the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStatus {
    Available,
    /// Allowed, but the platform may delay or skip wakes
    Restricted,
    /// Not allowed; only the foreground trigger will run
    Denied,
}

pub type BackgroundFuture = Pin<Box<dyn Future<Output = BackgroundFetchResult> + Send>>;

/// Body of a recurring task. Must build everything it needs per call, since
/// the platform may run it in a freshly launched process.
pub type BackgroundTask = Arc<dyn Fn() -> BackgroundFuture + Send + Sync>;

/// Platform facility that wakes the process periodically
pub trait RecurringTaskScheduler: Send + Sync {
    fn status(&self) -> BackgroundStatus;

    /// Register `task` to run every `interval`, replacing any earlier registration
    fn register(&self, interval: Duration, task: BackgroundTask) -> Result<()>;

    fn unregister(&self);

    fn is_registered(&self) -> bool;
}

/// One background wake: sync if anything is queued and say whether it helped.
pub async fn background_wake<Q, C>(orchestrator: &SyncOrchestrator<Q, C>) -> BackgroundFetchResult
where
    Q: CheckInQueue,
    C: SubmissionClient,
{
    let pending = match orchestrator.queue().count().await {
        Ok(pending) => pending,
        Err(error) => {
            tracing::error!("Background sync could not read the queue: {error}");
            return BackgroundFetchResult::Failed;
        }
    };

    if pending == 0 {
        tracing::debug!("Background wake: queue empty");
        return BackgroundFetchResult::NoData;
    }

    match orchestrator.run().await {
        Ok(report) if report.success > 0 => {
            tracing::info!(
                success = report.success,
                failed = report.failed,
                "Background sync delivered check-ins"
            );
            BackgroundFetchResult::NewData
        }
        Ok(report) => {
            tracing::warn!(failed = report.failed, "Background sync delivered nothing");
            BackgroundFetchResult::Failed
        }
        Err(error) => {
            tracing::error!("Background sync failed: {error}");
            BackgroundFetchResult::Failed
        }
    }
}

/// In-process scheduler on the tokio runtime.
///
/// Stands in for the OS scheduler while a long-lived process is running.
/// The first wake happens one interval after registration.
#[derive(Default)]
pub struct IntervalScheduler {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecurringTaskScheduler for IntervalScheduler {
    fn status(&self) -> BackgroundStatus {
        BackgroundStatus::Available
    }

    fn register(&self, interval: Duration, task: BackgroundTask) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|error| {
            Error::Configuration(format!("background scheduler needs a tokio runtime: {error}"))
        })?;
        if interval.is_zero() {
            return Err(Error::Configuration(
                "background interval must be greater than zero".to_string(),
            ));
        }

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let result = task().await;
                tracing::debug!(?result, "Background wake finished");
            }
        });

        if let Some(previous) = self.slot().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    fn unregister(&self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
    }

    fn is_registered(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueService;
    use crate::client::SubmitError;
    use crate::models::{CheckInAck, PendingCheckIn};
    use crate::testing::{event, eventually, AcceptingClient, BrokenQueue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UnreachableClient;

    impl SubmissionClient for UnreachableClient {
        async fn submit(
            &self,
            _item: &PendingCheckIn,
        ) -> std::result::Result<CheckInAck, SubmitError> {
            Err(SubmitError::Network("connection refused".to_string()))
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wake_on_empty_queue_reports_no_data() {
        let queue = QueueService::open_in_memory().await.unwrap();
        let orchestrator = SyncOrchestrator::new(queue, AcceptingClient::default());

        assert_eq!(
            background_wake(&orchestrator).await,
            BackgroundFetchResult::NoData
        );
        assert_eq!(orchestrator.client().calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wake_with_pending_items_reports_new_data() {
        let queue = QueueService::open_in_memory().await.unwrap();
        queue.enqueue(event()).await.unwrap();
        let orchestrator = SyncOrchestrator::new(queue, AcceptingClient::default());

        assert_eq!(
            background_wake(&orchestrator).await,
            BackgroundFetchResult::NewData
        );
        assert_eq!(orchestrator.queue().count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wake_with_only_failures_reports_failed() {
        let queue = QueueService::open_in_memory().await.unwrap();
        queue.enqueue(event()).await.unwrap();
        let orchestrator = SyncOrchestrator::new(queue, UnreachableClient);

        assert_eq!(
            background_wake(&orchestrator).await,
            BackgroundFetchResult::Failed
        );
        assert_eq!(orchestrator.queue().count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wake_reports_failed_when_storage_is_gone() {
        let orchestrator = SyncOrchestrator::new(BrokenQueue, AcceptingClient::default());

        assert_eq!(
            background_wake(&orchestrator).await,
            BackgroundFetchResult::Failed
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interval_scheduler_runs_until_unregistered() {
        let scheduler = IntervalScheduler::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let task: BackgroundTask = Arc::new(move || -> BackgroundFuture {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { BackgroundFetchResult::NoData })
        });

        scheduler
            .register(Duration::from_millis(20), task)
            .unwrap();
        assert!(scheduler.is_registered());
        assert!(eventually(|| wakes.load(Ordering::SeqCst) >= 2).await);

        scheduler.unregister();
        assert!(!scheduler.is_registered());
        let after_stop = wakes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(wakes.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn interval_scheduler_requires_a_runtime() {
        let scheduler = IntervalScheduler::new();
        let task: BackgroundTask =
            Arc::new(|| -> BackgroundFuture { Box::pin(async { BackgroundFetchResult::NoData }) });

        assert!(scheduler.register(Duration::from_secs(1), task).is_err());
        assert!(!scheduler.is_registered());
    }
}
