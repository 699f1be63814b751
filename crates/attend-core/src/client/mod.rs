//! HTTP client for the attendance check-in endpoint.

use std::future::Future;

use chrono::SecondsFormat;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ClientConfig;
use crate::models::{CheckInAck, DeviceInfo, FailureKind, IdempotencyKey, PendingCheckIn};
use crate::util::{compact_text, normalize_text_option};

/// Path of the check-in endpoint relative to the API base URL
pub const CHECK_IN_PATH: &str = "/hrm/check-in";

/// Why a submission did not produce an acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// No response reached us (connect failure, timeout, dropped connection)
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with a 5xx status
    #[error("Server error: {message}")]
    Server { status: u16, message: String },
    /// The server refused the check-in (4xx, or a business error in the envelope)
    #[error("Check-in rejected: {message}")]
    Rejected { status: u16, message: String },
    /// A success status with a body we could not decode
    #[error("Invalid check-in response: {0}")]
    InvalidResponse(String),
    /// The HTTP client could not be built from the configuration
    #[error("Invalid submission client configuration: {0}")]
    InvalidConfiguration(String),
}

impl SubmitError {
    /// Retry classification of this failure
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::Connectivity,
            Self::Server { .. } | Self::InvalidResponse(_) => FailureKind::Transient,
            Self::Rejected { .. } | Self::InvalidConfiguration(_) => FailureKind::Permanent,
        }
    }

    /// True when the request never reached the server
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// True when a fresh capture hitting this error should be queued instead of surfaced
    pub const fn should_queue(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

/// Sends one pending check-in to the backend
pub trait SubmissionClient: Send + Sync {
    fn submit(
        &self,
        item: &PendingCheckIn,
    ) -> impl Future<Output = Result<CheckInAck, SubmitError>> + Send;
}

/// reqwest-backed client for `POST {api_base_url}/hrm/check-in`
#[derive(Clone)]
pub struct AttendanceClient {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for AttendanceClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AttendanceClient")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl AttendanceClient {
    pub fn new(config: &ClientConfig) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|error| SubmitError::InvalidConfiguration(error.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint(CHECK_IN_PATH),
            token: None,
            client,
        })
    }

    /// Attach a bearer token; blank tokens are ignored
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = normalize_text_option(token);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    async fn post(&self, item: &PendingCheckIn) -> Result<CheckInAck, SubmitError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&CheckInPayload::from(item));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|error| {
            if error.is_builder() {
                SubmitError::InvalidConfiguration(error.to_string())
            } else {
                SubmitError::Network(error.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Server {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }
        if !status.is_success() {
            return Err(SubmitError::InvalidResponse(format!(
                "unexpected HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|error| SubmitError::InvalidResponse(error.to_string()))?;
        decode_envelope(status, &body)
    }
}

impl SubmissionClient for AttendanceClient {
    async fn submit(&self, item: &PendingCheckIn) -> Result<CheckInAck, SubmitError> {
        tracing::debug!(
            local_id = %item.local_id,
            idempotency_key = %item.idempotency_key,
            retry_count = item.retry_count,
            "Submitting check-in"
        );
        self.post(item).await
    }
}

#[derive(Debug, Serialize)]
struct CheckInPayload<'a> {
    uuid: IdempotencyKey,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    timestamp: String,
    device_timestamp: i64,
    is_mock: bool,
    device_info: &'a DeviceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_ref: Option<&'a str>,
}

impl<'a> From<&'a PendingCheckIn> for CheckInPayload<'a> {
    fn from(item: &'a PendingCheckIn) -> Self {
        Self {
            uuid: item.idempotency_key,
            latitude: item.coordinates.latitude,
            longitude: item.coordinates.longitude,
            accuracy: item.coordinates.accuracy_m,
            timestamp: item
                .captured_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            device_timestamp: item.device_clock_at,
            is_mock: item.coordinates.is_mock,
            device_info: &item.device_info,
            photo_ref: item.photo_ref.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: Option<i64>,
    message: Option<String>,
    data: Option<serde_json::Value>,
    trace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn decode_envelope(status: StatusCode, body: &str) -> Result<CheckInAck, SubmitError> {
    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|error| SubmitError::InvalidResponse(error.to_string()))?;

    if let Some(code) = envelope.code.filter(|code| *code != 200) {
        tracing::warn!(
            code,
            trace_id = envelope.trace_id.as_deref().unwrap_or("-"),
            "Check-in rejected by business rule"
        );
        let message = envelope
            .message
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| format!("code {code}"));
        return Err(SubmitError::Rejected {
            status: u16::try_from(code).unwrap_or_else(|_| status.as_u16()),
            message,
        });
    }

    let data = envelope
        .data
        .filter(|data| !data.is_null())
        .ok_or_else(|| SubmitError::InvalidResponse("response did not include data".to_string()))?;
    serde_json::from_value(data).map_err(|error| SubmitError::InvalidResponse(error.to_string()))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
