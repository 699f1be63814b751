//! Sources that decide when the sync orchestrator runs.
//!
//! Two triggers feed the same orchestrator: a foreground listener reacting to
//! connectivity changes, and a periodic background wake registered with a
//! platform scheduler. Neither debounces; overlapping runs are absorbed by
//! the orchestrator's run flag.

mod background;
mod foreground;
mod worker;

pub use background::{
    background_wake, BackgroundFetchResult, BackgroundFuture, BackgroundStatus, BackgroundTask,
    IntervalScheduler, RecurringTaskScheduler,
};
pub use foreground::{ConnectivityProbe, ForegroundTrigger};
pub use worker::{SyncWorker, WorkerStatus};

use serde::{Deserialize, Serialize};

/// Snapshot of the device's network state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    /// A network interface is up
    pub connected: bool,
    /// The internet (our backend) is actually reachable through it
    pub internet_reachable: bool,
}

impl ConnectivityState {
    pub const ONLINE: Self = Self {
        connected: true,
        internet_reachable: true,
    };
    pub const OFFLINE: Self = Self {
        connected: false,
        internet_reachable: false,
    };

    /// Submissions are only attempted when both flags hold
    pub const fn is_online(self) -> bool {
        self.connected && self.internet_reachable
    }
}
