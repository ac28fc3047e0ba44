use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the exclusivity gate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateConfig {
    /// Holding the gate longer than this logs a warning on release.
    /// Holds span remote store round-trips, so this is generous.
    pub hold_warning: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            hold_warning: Duration::from_secs(30),
        }
    }
}
