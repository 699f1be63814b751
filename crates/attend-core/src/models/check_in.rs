//! Check-in model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Queue-local identifier of a pending check-in, using UUID v7 (time-sortable).
///
/// Only addresses the item inside the local queue; it is never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new unique local ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Server-facing deduplication token, generated once per real-world check-in.
///
/// Sent as `uuid` on every submission attempt of the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    /// Generate a fresh random key
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdempotencyKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A position reported by the location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, when the provider reports one
    pub accuracy_m: Option<f64>,
    /// Position came from a simulated/mocked provider
    pub is_mock: bool,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            is_mock: false,
        }
    }
}

/// Device identifiers attached to every submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub os: String,
}

impl DeviceInfo {
    /// Device info for the current host with the given model label
    #[must_use]
    pub fn current(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// A captured attendance event, before it is assigned a queue slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInEvent {
    pub idempotency_key: IdempotencyKey,
    pub coordinates: Coordinates,
    /// Event time
    pub captured_at: DateTime<Utc>,
    /// Device clock at capture (Unix ms), kept apart so the server can detect skew
    pub device_clock_at: i64,
    #[serde(default)]
    pub photo_ref: Option<String>,
    pub device_info: DeviceInfo,
}

impl CheckInEvent {
    /// Capture a new event now, with a freshly generated idempotency key
    #[must_use]
    pub fn capture(coordinates: Coordinates, device_info: DeviceInfo) -> Self {
        let now = Utc::now();
        Self {
            idempotency_key: IdempotencyKey::generate(),
            coordinates,
            captured_at: now,
            device_clock_at: now.timestamp_millis(),
            photo_ref: None,
            device_info,
        }
    }

    #[must_use]
    pub fn with_photo_ref(mut self, photo_ref: impl Into<String>) -> Self {
        self.photo_ref = Some(photo_ref.into());
        self
    }
}

/// One queued, not-yet-confirmed attendance event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCheckIn {
    pub local_id: LocalId,
    pub idempotency_key: IdempotencyKey,
    pub coordinates: Coordinates,
    pub captured_at: DateTime<Utc>,
    pub device_clock_at: i64,
    #[serde(default)]
    pub photo_ref: Option<String>,
    pub device_info: DeviceInfo,
    pub retry_count: u32,
    /// Queue insertion time (Unix ms)
    pub enqueued_at: i64,
    /// Message of the most recent failed submission
    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingCheckIn {
    /// Wrap a captured event as a fresh queue item
    #[must_use]
    pub fn from_event(event: CheckInEvent, enqueued_at: i64) -> Self {
        Self {
            local_id: LocalId::new(),
            idempotency_key: event.idempotency_key,
            coordinates: event.coordinates,
            captured_at: event.captured_at,
            device_clock_at: event.device_clock_at,
            photo_ref: event.photo_ref,
            device_info: event.device_info,
            retry_count: 0,
            enqueued_at,
            last_error: None,
        }
    }

    /// Age of the item relative to `now_ms`
    #[must_use]
    pub const fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.enqueued_at)
    }
}

/// A check-in that exhausted its retries and will not be submitted automatically again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCheckIn {
    #[serde(flatten)]
    pub item: PendingCheckIn,
    /// When the item was moved out of the active queue (Unix ms)
    pub failed_at: i64,
}
