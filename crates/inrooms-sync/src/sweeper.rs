//! Background sync loop

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::retry::RetryConfig;
use crate::SyncService;

/// Periodically drains the pending-sync queue.
///
/// A pass in which every attempt failed (or the query itself failed) backs
/// off exponentially; any success resets to the regular interval.
pub struct SyncSweeper {
    service: SyncService,
    interval: Duration,
    backoff: RetryConfig,
}

impl SyncSweeper {
    pub fn new(service: SyncService) -> Self {
        let interval = service.config().interval;
        Self {
            service,
            interval,
            backoff: RetryConfig::new()
                .with_base_delay(interval)
                .with_max_delay(Duration::from_secs(600)),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: RetryConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before the next pass after `failed_passes` consecutive failures
    pub fn next_delay(&self, failed_passes: u32) -> Duration {
        match failed_passes {
            0 => self.interval,
            n => self.backoff.delay_for_attempt(n - 1).max(self.interval),
        }
    }

    /// Run until the task is dropped.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Sync sweeper started");
        let mut failed_passes: u32 = 0;

        loop {
            sleep(self.next_delay(failed_passes)).await;

            match self.service.sync_pending().await {
                Ok(report) if report.all_failed() => {
                    failed_passes = failed_passes.saturating_add(1);
                    warn!(failed_passes, "Every sync in the pass failed, backing off");
                }
                Ok(_) => failed_passes = 0,
                Err(e) => {
                    failed_passes = failed_passes.saturating_add(1);
                    error!(error = %e, failed_passes, "Sync pass failed");
                }
            }
        }
    }
}
