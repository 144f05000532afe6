//! Wire types of the installation and consumption endpoints

use serde::Deserialize;
use std::collections::HashMap;

/// Installation listing response, either of the two observed shapes.
///
/// The paged shape carries `data` and a `totalCount` for continuation; the
/// listed shape is a single page under `instalation_list` (provider
/// spelling). Variant order matters: `data` and `status` are required in
/// their variants so the decoder cannot pick the wrong one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InstallationPage {
    Paged {
        data: Vec<InstallationRecord>,
        #[serde(rename = "totalCount", default)]
        total_count: u32,
        #[serde(default)]
        success: bool,
        #[serde(default)]
        message: Option<String>,
    },
    Listed {
        status: i32,
        #[serde(default)]
        message: Option<String>,
        #[serde(rename = "instalation_list", default)]
        installation_list: Vec<InstallationEntry>,
        #[serde(rename = "transactionId", default)]
        transaction_id: Option<String>,
    },
}

/// Installation record of the paged shape
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRecord {
    #[serde(default)]
    pub id: i64,

    #[serde(rename = "tesisatNo", default)]
    pub installation_number: Option<String>,

    #[serde(rename = "aboneAdiSoyadi", default)]
    pub subscriber_name: Option<String>,

    #[serde(rename = "sayacSeriNo", default)]
    pub meter_serial_no: Option<String>,

    #[serde(rename = "adres", default)]
    pub address: Option<String>,

    #[serde(rename = "companyId", default)]
    pub company_id: u32,
}

/// Installation record of the listed shape
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationEntry {
    #[serde(rename = "instalationNumber", default)]
    pub installation_number: Option<String>,

    #[serde(default)]
    pub etso: Option<String>,

    #[serde(rename = "customerName", default)]
    pub customer_name: Option<String>,

    #[serde(rename = "meterNumber", default)]
    pub meter_number: Option<String>,
}

/// Normalized installation used throughout the importer
#[derive(Debug, Clone)]
pub struct Installation {
    /// Provider installation number ("tesisat no"), the sweep key
    pub number: String,

    /// Settlement (ETSO) code when the listing carried one
    pub natural_code: Option<String>,

    /// Subscriber or customer name, for log lines only
    pub display_name: String,
}

impl Installation {
    /// Normalize a paged-shape record; records without an installation
    /// number cannot be swept and yield `None`.
    pub fn from_record(record: InstallationRecord) -> Option<Self> {
        let number = non_empty(record.installation_number)?;
        Some(Self {
            number,
            natural_code: None,
            display_name: record.subscriber_name.unwrap_or_default(),
        })
    }

    /// Normalize a listed-shape record
    pub fn from_entry(entry: InstallationEntry) -> Option<Self> {
        let number = non_empty(entry.installation_number)?;
        Some(Self {
            number,
            natural_code: non_empty(entry.etso),
            display_name: entry.customer_name.unwrap_or_default(),
        })
    }
}

/// Hourly consumption response, either of the two observed shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConsumptionResponse {
    /// Flat list with string-encoded fields
    Flat {
        data: Vec<HourlyRecord>,
        #[serde(rename = "totalCount", default)]
        total_count: u32,
        #[serde(default)]
        success: bool,
        #[serde(default)]
        message: Option<String>,
    },
    /// Map keyed by installation number with per-meter value lists
    Metered {
        items: HashMap<String, Vec<MeterSeries>>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// One reading of the flat shape; every field arrives as a string literal
#[derive(Debug, Clone, Deserialize)]
pub struct HourlyRecord {
    #[serde(rename = "tesisatNo", default)]
    pub installation_number: Option<String>,

    #[serde(rename = "etsoKodu", default)]
    pub etso_code: Option<String>,

    #[serde(rename = "serialNo", default)]
    pub serial_no: Option<String>,

    #[serde(rename = "timeStamp", default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub generation: Option<String>,

    #[serde(default)]
    pub consumption: Option<String>,
}

/// One meter of the map shape
#[derive(Debug, Clone, Deserialize)]
pub struct MeterSeries {
    #[serde(rename = "installationNumber", default)]
    pub installation_number: Option<String>,

    #[serde(rename = "meterSerialNo", default)]
    pub meter_serial_no: Option<String>,

    #[serde(rename = "valueList", default)]
    pub value_list: Vec<MeterValue>,
}

/// One hourly value of the map shape
#[derive(Debug, Clone, Deserialize)]
pub struct MeterValue {
    #[serde(rename = "meterDate", default)]
    pub meter_date: Option<String>,

    #[serde(rename = "activeConsumption")]
    pub active_consumption: f64,
}

/// Normalized reading handed to the reconciler.
///
/// Timestamp and consumption stay as the provider's raw literals so a
/// malformed record fails during reconciliation of that record alone.
#[derive(Debug, Clone)]
pub struct Reading {
    /// Settlement code, when either the record or the listing carried one
    pub natural_code: Option<String>,

    /// Installation number the reading belongs to
    pub installation_number: String,

    /// Meter serial, when present
    pub meter_serial: Option<String>,

    /// Raw timestamp literal, e.g. "31-01-2025 23:00"
    pub timestamp: String,

    /// Raw consumption literal with a dot decimal separator
    pub consumption: String,

    /// Requested month formatted "YYYY-MM"
    pub period: String,
}

/// Format a sweep month as the stored period string
pub fn format_period(month: u32, year: i32) -> String {
    format!("{:04}-{:02}", year, month)
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_period() {
        assert_eq!(format_period(1, 2025), "2025-01");
        assert_eq!(format_period(12, 2023), "2023-12");
    }

    #[test]
    fn test_installation_normalization_requires_number() {
        let record = InstallationRecord {
            id: 7,
            installation_number: Some("  ".to_string()),
            subscriber_name: Some("Acme".to_string()),
            meter_serial_no: None,
            address: None,
            company_id: 2,
        };
        assert!(Installation::from_record(record).is_none());

        let entry = InstallationEntry {
            installation_number: Some("4003829127".to_string()),
            etso: Some("TR00123".to_string()),
            customer_name: None,
            meter_number: None,
        };
        let installation = Installation::from_entry(entry).unwrap();
        assert_eq!(installation.number, "4003829127");
        assert_eq!(installation.natural_code.as_deref(), Some("TR00123"));
    }
}
