//! Scheduled import runs
//!
//! A supervised periodic task around the orchestrator: one sweep per
//! interval, failures logged and absorbed, shutdown honored both between
//! runs and inside a running sweep.

use crate::api::{ConsumptionSource, InstallationDirectory};
use crate::config::ImportConfig;
use crate::logging::get_logger;
use tokio::sync::watch;
use tokio::time::Duration;

use super::{ImportOrchestrator, wait_or_cancel};

/// Periodic wrapper around `ImportOrchestrator`
pub struct ImportScheduler<D, S> {
    orchestrator: ImportOrchestrator<D, S>,
    config: ImportConfig,
    logger: crate::logging::StructuredLogger,
}

impl<D: InstallationDirectory, S: ConsumptionSource> ImportScheduler<D, S> {
    /// Create a scheduler around a composed orchestrator
    pub fn new(orchestrator: ImportOrchestrator<D, S>, config: ImportConfig) -> Self {
        Self {
            orchestrator,
            config,
            logger: get_logger("scheduler"),
        }
    }

    /// Run scheduled sweeps until the shutdown flag flips.
    ///
    /// With auto-import disabled the task stays alive but idle, so the
    /// process keeps its credential warm for on-demand use.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.auto_import_enabled {
            self.logger
                .info("Automatic import disabled, scheduler idle");
            loop {
                if wait_or_cancel(&mut shutdown, Duration::from_secs(3600)).await {
                    return;
                }
            }
        }

        self.logger.info(&format!(
            "Import scheduler started (initial delay {} min, interval {} h)",
            self.config.initial_delay_minutes, self.config.refresh_interval_hours
        ));

        let initial_delay = Duration::from_secs(self.config.initial_delay_minutes * 60);
        if wait_or_cancel(&mut shutdown, initial_delay).await {
            self.logger.info("Import scheduler stopped");
            return;
        }

        loop {
            self.logger.info("Starting scheduled consumption import");

            match self.orchestrator.run_sweep(&mut shutdown).await {
                Ok(result) => self.logger.info(&format!(
                    "Scheduled import finished: {} readings upserted, {} errors",
                    result.success_count, result.error_count
                )),
                Err(e) => self
                    .logger
                    .error(&format!("Scheduled import failed: {}", e)),
            }

            let interval = Duration::from_secs(self.config.refresh_interval_hours * 3600);
            if wait_or_cancel(&mut shutdown, interval).await {
                break;
            }
        }

        self.logger.info("Import scheduler stopped");
    }
}
