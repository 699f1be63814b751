//! Error types for attend-core

use thiserror::Error;

use crate::client::SubmitError;

/// Result type alias using attend-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in attend-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input (bad location fix, outside geofence, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Check-in submission failed and was not queued
    #[error("Check-in submission failed: {0}")]
    Submission(#[from] SubmitError),
}
