//! Shared fakes for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::client::{SubmissionClient, SubmitError};
use crate::db::RetryOutcome;
use crate::models::{
    CheckInAck, CheckInEvent, CheckInKind, Coordinates, DeviceInfo, LocalId, PendingCheckIn,
    PunctualityStatus,
};
use crate::queue::CheckInQueue;
use crate::{Error, Result};

pub fn ack(log_id: i64) -> CheckInAck {
    CheckInAck {
        log_id,
        kind: CheckInKind::CheckIn,
        status: PunctualityStatus::OnTime,
        status_label: None,
        office_name: None,
        distance_meters: None,
        time: None,
    }
}

pub fn event() -> CheckInEvent {
    CheckInEvent::capture(
        Coordinates::new(21.0278, 105.8342),
        DeviceInfo::current("test-device"),
    )
}

/// Accepts every submission and counts calls
#[derive(Default)]
pub struct AcceptingClient {
    calls: AtomicUsize,
}

impl AcceptingClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SubmissionClient for AcceptingClient {
    async fn submit(&self, _item: &PendingCheckIn) -> std::result::Result<CheckInAck, SubmitError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ack(i64::try_from(call).unwrap_or_default() + 1))
    }
}

/// Queue whose storage is gone
pub struct BrokenQueue;

fn unavailable() -> Error {
    Error::Database("storage unavailable".to_string())
}

impl CheckInQueue for BrokenQueue {
    async fn enqueue(&self, _event: CheckInEvent) -> Result<LocalId> {
        Err(unavailable())
    }

    async fn list(&self) -> Result<Vec<PendingCheckIn>> {
        Err(unavailable())
    }

    async fn remove(&self, _local_id: &LocalId) -> Result<()> {
        Err(unavailable())
    }

    async fn increment_retry(
        &self,
        _local_id: &LocalId,
        _last_error: Option<&str>,
    ) -> Result<RetryOutcome> {
        Err(unavailable())
    }

    async fn count(&self) -> Result<usize> {
        Err(unavailable())
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
