//! Import orchestration
//!
//! One sweep walks every installation across the configured month window,
//! fetching and reconciling one (installation, month) unit of work at a
//! time. The sweep is deliberately sequential: the portal is rate limited
//! and the credential is short-lived, so unmanaged fan-out buys nothing
//! but 401s. Failures are contained at the smallest sensible granularity.

pub mod scheduler;

pub use scheduler::ImportScheduler;

use crate::api::types::{Installation, Reading};
use crate::api::{ConsumptionSource, InstallationDirectory};
use crate::auth::{Credential, CredentialStore};
use crate::config::ImportConfig;
use crate::error::{OsosyncError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::store::ReadingReconciler;
use chrono::{Datelike, Local};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};
use uuid::Uuid;

/// Cap on error strings kept verbatim; failures beyond it are still counted
const MAX_RECORDED_ERRORS: usize = 50;

/// Aggregated outcome of one sweep
#[derive(Debug)]
pub struct ImportResult {
    /// Sweep identifier, also attached to every log line of the run
    pub run_id: String,

    /// Readings written (inserted or updated)
    pub success_count: u32,

    /// Failed readings and failed units of work
    pub error_count: u32,

    /// First `MAX_RECORDED_ERRORS` error messages, in occurrence order
    pub errors: Vec<String>,
}

impl ImportResult {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            success_count: 0,
            error_count: 0,
            errors: Vec::new(),
        }
    }

    fn record_error(&mut self, message: String) {
        self.error_count += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Generate the sweep window: `months` (month, year) pairs walking
/// backward from the given starting month, most recent first.
///
/// Only month and year are advanced, so calendar day overflow cannot
/// occur and the pairs are distinct by construction.
pub fn month_year_window(start_month: u32, start_year: i32, months: u32) -> Vec<(u32, i32)> {
    let mut window = Vec::with_capacity(months as usize);
    let (mut month, mut year) = (start_month, start_year);
    for _ in 0..months {
        window.push((month, year));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    window
}

/// Drives one full sweep over installations × months
pub struct ImportOrchestrator<D, S> {
    credentials: Arc<CredentialStore>,
    directory: D,
    source: S,
    reconciler: ReadingReconciler,
    config: ImportConfig,
}

impl<D: InstallationDirectory, S: ConsumptionSource> ImportOrchestrator<D, S> {
    /// Compose an orchestrator from its collaborators
    pub fn new(
        credentials: Arc<CredentialStore>,
        directory: D,
        source: S,
        reconciler: ReadingReconciler,
        config: ImportConfig,
    ) -> Self {
        Self {
            credentials,
            directory,
            source,
            reconciler,
            config,
        }
    }

    /// Access the reconciler (reporting queries, tests)
    pub fn reconciler(&self) -> &ReadingReconciler {
        &self.reconciler
    }

    /// Run one sweep to completion or cancellation.
    ///
    /// Partial failures are aggregated into the returned `ImportResult`;
    /// only two preconditions abort the whole run with an error: no
    /// credential can be obtained at all, and no installations exist.
    pub async fn run_sweep(&self, cancel: &mut watch::Receiver<bool>) -> Result<ImportResult> {
        let run_id = Uuid::new_v4().to_string();
        let logger = get_logger_with_context(
            LogContext::new("importer").with_run_id(run_id.clone()),
        );
        let mut result = ImportResult::new(run_id);

        let credential = self.obtain_credential().await?;
        let installations = self.list_with_retry(&credential).await?;
        if installations.is_empty() {
            return Err(OsosyncError::generic(
                "no installations available to import",
            ));
        }

        let now = Local::now();
        let window = month_year_window(now.month(), now.year(), self.config.sweep_months);
        logger.info(&format!(
            "Sweeping {} installations over {} months",
            installations.len(),
            window.len()
        ));

        'sweep: for installation in &installations {
            for &(month, year) in &window {
                if is_cancelled(cancel) {
                    logger.info("Sweep cancelled");
                    break 'sweep;
                }

                self.import_unit(installation, month, year, &mut result, &logger)
                    .await;

                // Unconditional pacing after every unit, success or not;
                // the portal rate limits by request spacing.
                if wait_or_cancel(
                    cancel,
                    Duration::from_millis(self.config.request_delay_ms),
                )
                .await
                {
                    logger.info("Sweep cancelled");
                    break 'sweep;
                }
            }
        }

        logger.info(&format!(
            "Sweep finished: {} readings upserted, {} errors",
            result.success_count, result.error_count
        ));
        Ok(result)
    }

    /// One (installation, month) unit of work. Never fails the sweep.
    async fn import_unit(
        &self,
        installation: &Installation,
        month: u32,
        year: i32,
        result: &mut ImportResult,
        logger: &StructuredLogger,
    ) {
        let unit = format!("installation {}, {}/{}", installation.number, month, year);

        let credential = match self.obtain_credential().await {
            Ok(credential) => credential,
            Err(e) => {
                logger.error(&format!("{}: no credential: {}", unit, e));
                result.record_error(format!("{}: {}", unit, e));
                return;
            }
        };

        let readings = match self
            .fetch_with_retry(&credential, installation, month, year)
            .await
        {
            Ok(readings) => readings,
            Err(e) => {
                logger.error(&format!("{}: fetch failed: {}", unit, e));
                result.record_error(format!("{}: {}", unit, e));
                return;
            }
        };

        if readings.is_empty() {
            logger.debug(&format!("{}: no readings", unit));
            return;
        }

        let outcome = self
            .reconciler
            .upsert_batch(&readings, &installation.number);
        logger.debug(&format!(
            "{}: {} readings upserted, {} failed",
            unit, outcome.upserted, outcome.failed
        ));
        result.success_count += outcome.upserted;
        for error in outcome.errors {
            result.record_error(error);
        }
    }

    /// Current credential, forcing a refresh only when the store has none
    async fn obtain_credential(&self) -> Result<Credential> {
        if let Some(credential) = self.credentials.read().await {
            return Ok(credential);
        }
        self.credentials.refresh(true).await
    }

    /// List installations, retrying once after a forced refresh on 401
    async fn list_with_retry(&self, credential: &Credential) -> Result<Vec<Installation>> {
        match self.directory.list(credential).await {
            Err(e) if e.is_unauthorized() => {
                let refreshed = self.credentials.refresh(true).await?;
                self.directory.list(&refreshed).await
            }
            other => other,
        }
    }

    /// Fetch one unit, retrying at most once after a forced refresh on 401.
    ///
    /// A bounded loop, not recursion: under a sustained-401 condition the
    /// second answer is surfaced as the unit's failure.
    async fn fetch_with_retry(
        &self,
        credential: &Credential,
        installation: &Installation,
        month: u32,
        year: i32,
    ) -> Result<Vec<Reading>> {
        let mut credential = credential.clone();
        let mut retried = false;
        loop {
            match self
                .source
                .fetch(&credential, installation, month, year)
                .await
            {
                Err(e) if e.is_unauthorized() && !retried => {
                    retried = true;
                    credential = self.credentials.refresh(true).await?;
                }
                other => return other,
            }
        }
    }
}

/// Whether the cancellation flag is set right now
pub(crate) fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

/// Sleep for `delay`, waking early on cancellation. Returns true when
/// cancelled (a dropped sender counts as cancellation).
pub(crate) async fn wait_or_cancel(cancel: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    // A flag that flipped while the caller was busy has already been seen
    // by the channel; check it directly before waiting.
    if *cancel.borrow() {
        return true;
    }
    tokio::select! {
        _ = sleep(delay) => false,
        changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
    }
}
