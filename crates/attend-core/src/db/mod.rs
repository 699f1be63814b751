//! Database layer for the check-in queue

mod connection;
mod kv_store;
mod migrations;
mod queue_repository;

pub use connection::Database;
pub use kv_store::LibSqlKvStore;
pub use queue_repository::{
    LibSqlQueueRepository, QueueRepository, RetryOutcome, ACTIVE_QUEUE_KEY, FAILED_QUEUE_KEY,
};
