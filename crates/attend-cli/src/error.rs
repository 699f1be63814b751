use std::io;

use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] attend_core::Error),
    #[error(transparent)]
    Submit(#[from] attend_core::SubmitError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error(
        "Attendance API is not configured. Run `attend config init --api-url <URL>` or set ATTEND_API_URL."
    )]
    NotConfigured,
}
