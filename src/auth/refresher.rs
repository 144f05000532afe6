//! Periodic background credential refresh
//!
//! Runs independently of import traffic so staleness is usually invisible
//! to callers. A failed tick is logged and retried on the next tick only;
//! ticks cannot overlap because the refresh is awaited inside the loop.

use crate::logging::get_logger;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

use super::store::CredentialStore;

/// Supervised periodic refresh task
pub struct CredentialRefresher {
    store: Arc<CredentialStore>,
    period: Duration,
    logger: crate::logging::StructuredLogger,
}

impl CredentialRefresher {
    /// Create a refresher ticking at the given period
    pub fn new(store: Arc<CredentialStore>, period: Duration) -> Self {
        Self {
            store,
            period,
            logger: get_logger("auth"),
        }
    }

    /// Run until the shutdown flag flips.
    ///
    /// The first tick fires immediately, covering the initial issuance the
    /// rest of the process waits on at startup.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        self.logger.info(&format!(
            "Credential refresher started (period {} s)",
            self.period.as_secs()
        ));

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.store.refresh(false).await {
                        self.logger.error(&format!(
                            "Scheduled credential refresh failed, retrying next tick: {}",
                            e
                        ));
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.logger.info("Credential refresher stopped");
    }
}
