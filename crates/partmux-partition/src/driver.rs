//! Async poll loop for one partition.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::Result;
use crate::partition::{Partition, PartitionStats};

/// Idle backoff bounds for [`drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Sleep after the first empty drain pass.
    pub idle_backoff: Duration,
    /// Upper bound the sleep doubles towards while the ring stays empty.
    pub max_idle_backoff: Duration,
}

/// Floor applied to both backoff bounds.
pub const MIN_IDLE_BACKOFF: Duration = Duration::from_micros(1);

impl DriverConfig {
    fn initial_backoff(&self) -> Duration {
        self.idle_backoff.max(MIN_IDLE_BACKOFF)
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        let ceiling = self.max_idle_backoff.max(self.initial_backoff());
        current.saturating_mul(2).min(ceiling)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_micros(50),
            max_idle_backoff: Duration::from_millis(10),
        }
    }
}

/// Call [`Partition::process`] until `cancel` fires, then close the
/// partition and return its final counters.
///
/// A drain error closes the partition and is returned.
pub async fn drive(
    mut partition: Partition,
    config: DriverConfig,
    cancel: CancellationToken,
) -> Result<PartitionStats> {
    let mut backoff = config.initial_backoff();
    debug!(partition = partition.name(), ?config, "driver started");

    while !cancel.is_cancelled() {
        let drained = match partition.process() {
            Ok(drained) => drained,
            Err(err) => {
                error!(partition = partition.name(), error = %err, "driver stopped on error");
                partition.close();
                return Err(err);
            }
        };

        if drained > 0 {
            backoff = config.initial_backoff();
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = config.next_backoff(backoff);
    }

    debug!(partition = partition.name(), "driver cancelled");
    Ok(partition.close())
}
