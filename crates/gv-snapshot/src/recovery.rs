use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gv_store::BlobStore;
use tracing::{error, info, warn};

use crate::config::SnapshotConfig;
use crate::error::RecoveryError;
use crate::reader::SnapshotReader;

/// Delay dependency of the recovery loop.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// The boot-time retry loop around [`SnapshotReader::load`].
///
/// A truncated bundle is retried at once against the penultimate snapshot.
/// Any other failure waits `retry_delay` and restarts from the most recent
/// one. The gate is released between attempts, so the delay never blocks
/// other holders.
pub struct Recovery<S> {
    reader: SnapshotReader<S>,
    config: SnapshotConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: BlobStore> Recovery<S> {
    pub fn new(reader: SnapshotReader<S>, config: SnapshotConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            reader,
            config,
            sleeper,
        }
    }

    /// Run attempts until one succeeds. Returns the number of attempts.
    ///
    /// With `max_attempts` unset this only returns on success. Once a bound
    /// is exhausted the last error is returned.
    pub async fn run(&self) -> Result<u32, RecoveryError> {
        let mut corrupted = false;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self.reader.load(corrupted).await {
                Ok(address) => {
                    info!(attempt, address = %address.short_hex(), "recovery complete");
                    return Ok(attempt);
                }
                Err(e) => e,
            };

            if self.config.max_attempts.is_some_and(|max| attempt >= max) {
                warn!(attempt, error = %err, "recovery attempts exhausted");
                return Err(err);
            }

            if err.is_truncation() {
                if corrupted {
                    // The penultimate bundle is truncated too; the next
                    // attempt lists again in case a new upload has landed.
                    error!(attempt, error = %err, "penultimate snapshot also truncated, retrying");
                } else {
                    warn!(attempt, error = %err, "truncated snapshot, retrying with penultimate");
                }
                corrupted = true;
            } else {
                warn!(
                    attempt,
                    kind = ?err.kind(),
                    error = %err,
                    delay_ms = self.config.retry_delay.as_millis() as u64,
                    "load failed, retrying from most recent"
                );
                self.sleeper.sleep(self.config.retry_delay).await;
                corrupted = false;
            }
        }
    }
}
