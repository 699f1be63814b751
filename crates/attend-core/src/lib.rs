//! attend-core - Core library for Attend
//!
//! Offline-first attendance check-ins: a durable local queue, the HTTP
//! submission client, the sync orchestrator that drains the queue, and the
//! triggers (connectivity changes and periodic background wakes) that run it.

pub mod capture;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod models;
pub mod queue;
pub mod sync;
pub mod triggers;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{CheckInOutcome, CheckInService, LocationFix};
pub use client::{AttendanceClient, SubmissionClient, SubmitError};
pub use config::{ClientConfig, QueuePolicy};
pub use db::RetryOutcome;
pub use error::{Error, Result};
pub use models::{CheckInAck, CheckInEvent, LocalId, PendingCheckIn, SyncReport};
pub use queue::{CheckInQueue, QueueService};
pub use sync::SyncOrchestrator;
pub use triggers::{ConnectivityState, SyncWorker};
