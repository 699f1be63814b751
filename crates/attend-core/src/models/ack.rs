//! Server acknowledgment of a recorded check-in

use serde::{Deserialize, Serialize};

/// Whether the server recorded the event as an arrival or a departure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInKind {
    CheckIn,
    CheckOut,
}

/// Punctuality classification assigned by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PunctualityStatus {
    OnTime,
    Late,
    Early,
}

/// Typed acknowledgment returned for a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInAck {
    /// Server-assigned attendance log id
    pub log_id: i64,
    #[serde(rename = "type")]
    pub kind: CheckInKind,
    pub status: PunctualityStatus,
    #[serde(default)]
    pub status_label: Option<String>,
    #[serde(default)]
    pub office_name: Option<String>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    /// Server-local wall clock time of the record, e.g. `08:15:22`
    #[serde(default)]
    pub time: Option<String>,
}
