//! Sync run results

use serde::{Deserialize, Serialize};

use super::LocalId;

/// How a failed submission should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The request never reached the server
    Connectivity,
    /// The server was reached but may succeed later (5xx, garbled body)
    Transient,
    /// The server rejected the request; retrying unchanged will not help
    Permanent,
}

/// One failed item in a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemError {
    pub local_id: LocalId,
    pub message: String,
    pub kind: FailureKind,
}

/// Aggregated outcome of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SyncItemError>,
}

impl SyncReport {
    /// Report with nothing attempted
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            success: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.success == 0 && self.failed == 0
    }

    pub(crate) fn record_success(&mut self) {
        self.success += 1;
    }

    pub(crate) fn record_failure(&mut self, local_id: LocalId, message: String, kind: FailureKind) {
        self.failed += 1;
        self.errors.push(SyncItemError {
            local_id,
            message,
            kind,
        });
    }
}
