//! Data models for Attend

mod ack;
mod check_in;
mod report;

pub use ack::{CheckInAck, CheckInKind, PunctualityStatus};
pub use check_in::{
    CheckInEvent, Coordinates, DeviceInfo, FailedCheckIn, IdempotencyKey, LocalId, PendingCheckIn,
};
pub use report::{FailureKind, SyncItemError, SyncReport};
