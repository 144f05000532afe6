//! Hourly consumption fetch and shape normalization

use crate::auth::Credential;
use crate::config::ApiConfig;
use crate::error::{OsosyncError, Result};
use crate::logging::{StructuredLogger, get_logger};
use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::client::ApiClient;
use super::types::{ConsumptionResponse, Installation, Reading, format_period, non_empty};

/// Timestamp literals the provider has been observed to emit. 24-hour
/// clock, day first; anything else is rejected rather than guessed at.
const METER_TIMESTAMP_FORMATS: [&str; 3] =
    ["%d-%m-%Y %H:%M", "%d.%m.%Y %H:%M", "%d/%m/%Y %H:%M"];

/// Parse a meter timestamp literal such as "31-01-2025 23:00"
pub fn parse_meter_timestamp(literal: &str) -> Result<NaiveDateTime> {
    let trimmed = literal.trim();
    for format in METER_TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    Err(OsosyncError::validation(
        "timestamp",
        &format!("unrecognized meter timestamp: {}", literal),
    ))
}

/// Seam for fetching one installation-month of hourly readings
#[async_trait]
pub trait ConsumptionSource: Send + Sync {
    /// Fetch the hourly readings of one (installation, month) pair.
    /// May legitimately be empty.
    async fn fetch(
        &self,
        credential: &Credential,
        installation: &Installation,
        month: u32,
        year: i32,
    ) -> Result<Vec<Reading>>;
}

/// HTTP implementation over `HourlyConsumption/ReadHourlyListData`
pub struct HttpConsumptionSource {
    client: ApiClient,
    config: ApiConfig,
    logger: StructuredLogger,
}

impl HttpConsumptionSource {
    pub fn new(client: ApiClient, config: ApiConfig) -> Self {
        Self {
            client,
            config,
            logger: get_logger("api"),
        }
    }

    fn readings_url(&self, installation: &Installation, month: u32, year: i32) -> String {
        format!(
            "{}/HourlyConsumption/ReadHourlyListData?tesisatNo={}&email={}&companyId={}&month={}&year={}",
            self.config.base_url, installation.number, self.config.email,
            self.config.company_id, month, year
        )
    }
}

#[async_trait]
impl ConsumptionSource for HttpConsumptionSource {
    async fn fetch(
        &self,
        credential: &Credential,
        installation: &Installation,
        month: u32,
        year: i32,
    ) -> Result<Vec<Reading>> {
        let url = self.readings_url(installation, month, year);
        let response: ConsumptionResponse = self.client.get_json(&url, credential).await?;
        Ok(normalize_readings(
            response,
            installation,
            &format_period(month, year),
            &self.logger,
        ))
    }
}

/// Flatten either response shape into the common reading representation.
///
/// Records without a timestamp or value are skipped with a warning; the
/// rest of the batch is unaffected. Timestamp and value literals are kept
/// raw so parse failures stay scoped to single records downstream.
pub fn normalize_readings(
    response: ConsumptionResponse,
    installation: &Installation,
    period: &str,
    logger: &StructuredLogger,
) -> Vec<Reading> {
    let mut readings = Vec::new();

    match response {
        ConsumptionResponse::Flat { data, .. } => {
            for record in data {
                let Some(timestamp) = non_empty(record.timestamp) else {
                    logger.warn(&format!(
                        "Skipping reading without timestamp for installation {}",
                        installation.number
                    ));
                    continue;
                };
                let Some(consumption) = non_empty(record.consumption) else {
                    logger.warn(&format!(
                        "Skipping reading without consumption value at {} for installation {}",
                        timestamp, installation.number
                    ));
                    continue;
                };

                readings.push(Reading {
                    natural_code: non_empty(record.etso_code)
                        .or_else(|| installation.natural_code.clone()),
                    installation_number: non_empty(record.installation_number)
                        .unwrap_or_else(|| installation.number.clone()),
                    meter_serial: non_empty(record.serial_no),
                    timestamp,
                    consumption,
                    period: period.to_string(),
                });
            }
        }
        ConsumptionResponse::Metered { items, .. } => {
            for (keyed_number, series_list) in items {
                for series in series_list {
                    let number = non_empty(series.installation_number.clone())
                        .unwrap_or_else(|| keyed_number.clone());
                    for value in series.value_list {
                        let Some(timestamp) = non_empty(value.meter_date) else {
                            logger.warn(&format!(
                                "Skipping meter value without date for installation {}",
                                number
                            ));
                            continue;
                        };
                        readings.push(Reading {
                            natural_code: installation.natural_code.clone(),
                            installation_number: number.clone(),
                            meter_serial: series.meter_serial_no.clone(),
                            // Numeric in this shape; carried as the same
                            // dot-decimal literal the flat shape uses
                            consumption: value.active_consumption.to_string(),
                            timestamp,
                            period: period.to_string(),
                        });
                    }
                }
            }
        }
    }

    readings
}
