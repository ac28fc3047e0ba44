use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy of the recovery loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Pause before retrying after any non-truncation failure.
    pub retry_delay: Duration,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl SnapshotConfig {
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}
