//! Reconciliation of fetched readings into the store
//!
//! Each reading's raw literals are parsed here, so one malformed record
//! costs exactly one error while the rest of the batch lands. Values are
//! stored under a fixed two-decimal convention with a dot separator,
//! independent of any host locale.

use crate::api::parse_meter_timestamp;
use crate::api::types::Reading;
use crate::error::{OsosyncError, Result};
use crate::logging::get_logger;
use chrono::{Datelike, Timelike, Utc};

use super::{ConsumptionRow, ConsumptionStore};

/// Outcome of reconciling one batch of readings
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Readings written (inserted or updated)
    pub upserted: u32,

    /// Readings dropped by a parse or storage failure
    pub failed: u32,

    /// One message per failed reading, in batch order
    pub errors: Vec<String>,
}

/// Writes batches of readings through the store's conflict-target upsert
pub struct ReadingReconciler {
    store: ConsumptionStore,
    company_tag: String,
    logger: crate::logging::StructuredLogger,
}

impl ReadingReconciler {
    /// Create a reconciler stamping rows with the given company tag
    pub fn new(store: ConsumptionStore, company_tag: &str) -> Self {
        Self {
            store,
            company_tag: company_tag.to_string(),
            logger: get_logger("store"),
        }
    }

    /// Access the underlying store (reporting queries, tests)
    pub fn store(&self) -> &ConsumptionStore {
        &self.store
    }

    /// Upsert a batch of readings for one installation.
    ///
    /// A failure affects only its own reading; the remainder of the batch
    /// is always attempted.
    pub fn upsert_batch(&self, readings: &[Reading], installation_number: &str) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for reading in readings {
            match self.reconcile_one(reading, installation_number) {
                Ok(()) => outcome.upserted += 1,
                Err(e) => {
                    let message = format!(
                        "installation {}, reading at '{}': {}",
                        installation_number, reading.timestamp, e
                    );
                    self.logger.warn(&message);
                    outcome.failed += 1;
                    outcome.errors.push(message);
                }
            }
        }

        outcome
    }

    fn reconcile_one(&self, reading: &Reading, installation_number: &str) -> Result<()> {
        let timestamp = parse_meter_timestamp(&reading.timestamp)?;
        let value = parse_consumption(&reading.consumption)?;

        // Degraded mode: without a settlement code the installation number
        // still gives a stable dedup key for this meter.
        let natural_code = match reading.natural_code.as_deref() {
            Some(code) if !code.trim().is_empty() => code.to_string(),
            _ => {
                self.logger.debug(&format!(
                    "No settlement code for installation {}, keying by installation number",
                    installation_number
                ));
                installation_number.to_string()
            }
        };

        let row = ConsumptionRow {
            period: reading.period.clone(),
            natural_code,
            installation_number: reading.installation_number.clone(),
            meter_id: None,
            distribution_company: self.company_tag.clone(),
            year: timestamp.year(),
            month: timestamp.month(),
            day: timestamp.day(),
            hour: timestamp.hour(),
            reading_time: timestamp,
            value: round_to_cents(value),
            created_at: Utc::now(),
        };

        self.store.upsert_row(&row)
    }
}

/// Parse a consumption literal under the invariant dot-decimal convention
fn parse_consumption(literal: &str) -> Result<f64> {
    let value: f64 = literal.trim().parse().map_err(|_| {
        OsosyncError::validation(
            "consumption",
            &format!("unparseable consumption value: {}", literal),
        )
    })?;
    if !value.is_finite() {
        return Err(OsosyncError::validation(
            "consumption",
            &format!("non-finite consumption value: {}", literal),
        ));
    }
    Ok(value)
}

/// Fixed-point convention of the stored value column
fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
