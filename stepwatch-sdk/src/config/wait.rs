//! Event wait configuration.

use std::time::Duration;

/// Bounds for a single `wait_for_any` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Hard upper bound on how long a wait may block.
    pub wait_time: Duration,
    /// Tolerated lateness of a timeout caused by task scheduling.
    pub scheduling_slack: Duration,
    /// Reject a wait when more than one request of the set fires.
    pub require_exactly_one: bool,
}

impl WaitConfig {
    pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(5);
    pub const DEFAULT_SCHEDULING_SLACK: Duration = Duration::from_millis(250);

    pub fn new(wait_time: Duration) -> Self {
        Self {
            wait_time,
            ..Self::default()
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            wait_time: Self::DEFAULT_WAIT_TIME,
            scheduling_slack: Self::DEFAULT_SCHEDULING_SLACK,
            require_exactly_one: false,
        }
    }
}
