//! Sync orchestrator: drains the check-in queue through the submission client.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::client::SubmissionClient;
use crate::db::RetryOutcome;
use crate::models::SyncReport;
use crate::queue::CheckInQueue;
use crate::Result;

/// Runs at most one sync pass at a time over a queue and a client.
///
/// The run flag lives in memory only, so a crashed process can never leave
/// it stuck: a relaunch starts idle.
pub struct SyncOrchestrator<Q, C> {
    queue: Q,
    client: C,
    running: AtomicBool,
}

/// Clears the run flag when a pass ends, including on error or panic
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<Q, C> SyncOrchestrator<Q, C>
where
    Q: CheckInQueue,
    C: SubmissionClient,
{
    pub const fn new(queue: Q, client: C) -> Self {
        Self {
            queue,
            client,
            running: AtomicBool::new(false),
        }
    }

    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Whether a pass is currently in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    /// Submit every pending check-in once, in stored order.
    ///
    /// Returns an empty report without touching the queue when another pass
    /// is already running. A connectivity failure stops the pass after
    /// recording the failed item; other failures move on to the next item.
    pub async fn run(&self) -> Result<SyncReport> {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("Sync already in progress, skipping");
            return Ok(SyncReport::empty());
        };

        let items = self.queue.list().await?;
        if items.is_empty() {
            tracing::debug!("No pending check-ins to sync");
            return Ok(SyncReport::empty());
        }

        tracing::info!(pending = items.len(), "Starting check-in sync");
        let total = items.len();
        let mut report = SyncReport::empty();

        for (index, item) in items.into_iter().enumerate() {
            match self.client.submit(&item).await {
                Ok(ack) => {
                    self.queue.remove(&item.local_id).await?;
                    report.record_success();
                    tracing::info!(
                        local_id = %item.local_id,
                        log_id = ack.log_id,
                        "Synced check-in"
                    );
                }
                Err(error) => {
                    let message = error.to_string();
                    let outcome = self
                        .queue
                        .increment_retry(&item.local_id, Some(&message))
                        .await?;
                    if outcome == RetryOutcome::NotFound {
                        tracing::debug!(local_id = %item.local_id, "Check-in vanished during sync");
                    }
                    tracing::warn!(
                        local_id = %item.local_id,
                        kind = ?error.kind(),
                        "Failed to sync check-in: {message}"
                    );
                    report.record_failure(item.local_id, message, error.kind());

                    if error.is_connectivity() {
                        tracing::warn!(
                            skipped = total - index - 1,
                            "Network unreachable, stopping sync pass"
                        );
                        break;
                    }
                }
            }
        }

        tracing::info!(
            success = report.success,
            failed = report.failed,
            "Check-in sync finished"
        );
        Ok(report)
    }
}
