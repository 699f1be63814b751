//! Startup and lifecycle of both sync triggers.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::background::{background_wake, BackgroundFuture, BackgroundStatus, BackgroundTask};
use super::{ConnectivityState, ForegroundTrigger, RecurringTaskScheduler};
use crate::client::SubmissionClient;
use crate::config::MIN_BACKGROUND_INTERVAL;
use crate::models::SyncReport;
use crate::queue::CheckInQueue;
use crate::sync::SyncOrchestrator;
use crate::Result;

/// Snapshot of what the worker has running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub foreground_listening: bool,
    pub background_status: BackgroundStatus,
    pub background_registered: bool,
    pub background_interval_secs: u64,
    pub sync_in_progress: bool,
}

/// Owns the foreground listener and the background registration for one orchestrator
pub struct SyncWorker<Q, C, S> {
    orchestrator: Arc<SyncOrchestrator<Q, C>>,
    scheduler: S,
    background_interval: Duration,
    foreground: Option<JoinHandle<()>>,
}

impl<Q, C, S> SyncWorker<Q, C, S>
where
    Q: CheckInQueue + 'static,
    C: SubmissionClient + 'static,
    S: RecurringTaskScheduler,
{
    pub const fn new(orchestrator: Arc<SyncOrchestrator<Q, C>>, scheduler: S) -> Self {
        Self {
            orchestrator,
            scheduler,
            background_interval: MIN_BACKGROUND_INTERVAL,
            foreground: None,
        }
    }

    /// Set the background period; values under the platform minimum are raised to it
    #[must_use]
    pub fn with_background_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_BACKGROUND_INTERVAL {
            tracing::warn!(
                requested_secs = interval.as_secs(),
                minimum_secs = MIN_BACKGROUND_INTERVAL.as_secs(),
                "Background interval below platform minimum, using the minimum"
            );
            self.background_interval = MIN_BACKGROUND_INTERVAL;
        } else {
            self.background_interval = interval;
        }
        self
    }

    pub const fn orchestrator(&self) -> &Arc<SyncOrchestrator<Q, C>> {
        &self.orchestrator
    }

    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Attach the foreground listener, register the background task, then
    /// sync once if already online.
    ///
    /// Returns the report of that initial pass, or `None` when offline or
    /// already started.
    pub async fn start(
        &mut self,
        connectivity: watch::Receiver<ConnectivityState>,
    ) -> Result<Option<SyncReport>> {
        if self.foreground.is_some() {
            tracing::warn!("Sync worker already started");
            return Ok(None);
        }

        let online_now = connectivity.borrow().is_online();
        self.foreground = Some(ForegroundTrigger::spawn(
            Arc::clone(&self.orchestrator),
            connectivity,
        ));
        self.register_background();
        tracing::info!("Sync worker started");

        if online_now {
            tracing::info!("Online at startup, running initial sync");
            return self.orchestrator.run().await.map(Some);
        }
        Ok(None)
    }

    fn register_background(&self) {
        match self.scheduler.status() {
            BackgroundStatus::Denied => {
                tracing::warn!("Background sync denied by the platform, foreground only");
                return;
            }
            BackgroundStatus::Restricted => {
                tracing::warn!("Background sync is restricted, wakes may be delayed or skipped");
            }
            BackgroundStatus::Available => {}
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let task: BackgroundTask = Arc::new(move || -> BackgroundFuture {
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move { background_wake(&orchestrator).await })
        });

        match self.scheduler.register(self.background_interval, task) {
            Ok(()) => tracing::info!(
                interval_secs = self.background_interval.as_secs(),
                "Background sync registered"
            ),
            Err(error) => tracing::warn!("Failed to register background sync: {error}"),
        }
    }

    /// Detach the foreground listener and unregister the background task
    pub fn stop(&mut self) {
        if let Some(handle) = self.foreground.take() {
            handle.abort();
        }
        self.scheduler.unregister();
        tracing::info!("Sync worker stopped");
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            foreground_listening: self
                .foreground
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
            background_status: self.scheduler.status(),
            background_registered: self.scheduler.is_registered(),
            background_interval_secs: self.background_interval.as_secs(),
            sync_in_progress: self.orchestrator.is_running(),
        }
    }
}

impl<Q, C, S> Drop for SyncWorker<Q, C, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.foreground.take() {
            handle.abort();
        }
    }
}
