//! Configuration management for Ososync
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{OsosyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Token endpoint and credential refresh configuration
    pub token: TokenConfig,

    /// OSOS portal API configuration
    pub api: ApiConfig,

    /// Local consumption store configuration
    pub database: DatabaseConfig,

    /// Import sweep configuration
    pub import: ImportConfig,

    /// Reporting/export limits
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Token endpoint and refresh parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// OAuth token endpoint URL
    pub url: String,

    /// Client id for the token exchange
    pub client_id: String,

    /// Client secret for the client-credentials grant
    pub client_secret: String,

    /// Provider consumer id sent as `consumerID`
    pub consumer_id: String,

    /// Grant flavor: "client_credentials" or "refresh_token"
    pub grant: String,

    /// Path of the durable rotating refresh-token file
    pub refresh_token_file: String,

    /// Background refresh interval in seconds
    pub refresh_interval_secs: u64,

    /// Fraction of the nominal token lifetime after which a credential is
    /// treated as stale. 0.5 means a 240 s token is refreshed after 120 s.
    pub freshness_factor: f64,
}

/// OSOS portal API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the portal API
    pub base_url: String,

    /// Account email sent with every data request
    pub email: String,

    /// Distribution company id sent with every data request
    pub company_id: u32,

    /// Page size for the installation listing
    pub page_size: u32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Consumption store parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file
    pub path: String,
}

/// Import sweep parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Whether the scheduled import task runs at all
    #[serde(default = "default_true")]
    pub auto_import_enabled: bool,

    /// Delay before the first scheduled sweep, in minutes
    pub initial_delay_minutes: u64,

    /// Interval between scheduled sweeps, in hours
    pub refresh_interval_hours: u64,

    /// How many months to walk back from the current month
    pub sweep_months: u32,

    /// Unconditional delay between consecutive portal requests, in ms
    pub request_delay_ms: u64,

    /// Distribution company tag stored with every row
    pub distribution_company: String,
}

/// Reporting/export limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum date range a single range query may span, in days
    pub max_date_range_days: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file or log directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            url: "https://mdmsaatlik.ayedas.com.tr/ayedas/mdm-api/oauth/token".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            consumer_id: "MDMAYPRD".to_string(),
            grant: "client_credentials".to_string(),
            refresh_token_file: "refresh_token.json".to_string(),
            // Shorter than the nominal 4-minute token lifetime
            refresh_interval_secs: 180,
            freshness_factor: 0.5,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ososweb-ayedas-api.eedas.com.tr".to_string(),
            email: String::new(),
            company_id: 2,
            page_size: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "ososync.db".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            auto_import_enabled: true,
            initial_delay_minutes: 5,
            refresh_interval_hours: 24,
            sweep_months: 24,
            request_delay_ms: 500,
            distribution_company: "AYEDAS".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_date_range_days: 366,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/var/log/ososync".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: TokenConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            import: ImportConfig::default(),
            export: ExportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "ososync.yaml",
            "/data/ososync.yaml",
            "/etc/ososync/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.token.url.is_empty() {
            return Err(OsosyncError::validation(
                "token.url",
                "Token endpoint URL cannot be empty",
            ));
        }

        match self.token.grant.as_str() {
            "client_credentials" | "refresh_token" => {}
            _ => {
                return Err(OsosyncError::validation(
                    "token.grant",
                    "Must be client_credentials or refresh_token",
                ));
            }
        }

        if !(self.token.freshness_factor > 0.0 && self.token.freshness_factor <= 1.0) {
            return Err(OsosyncError::validation(
                "token.freshness_factor",
                "Must be within (0, 1]",
            ));
        }

        if self.token.refresh_interval_secs == 0 {
            return Err(OsosyncError::validation(
                "token.refresh_interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.api.base_url.is_empty() {
            return Err(OsosyncError::validation(
                "api.base_url",
                "Base URL cannot be empty",
            ));
        }

        if self.api.page_size == 0 {
            return Err(OsosyncError::validation(
                "api.page_size",
                "Must be greater than 0",
            ));
        }

        if self.import.sweep_months == 0 {
            return Err(OsosyncError::validation(
                "import.sweep_months",
                "Must be greater than 0",
            ));
        }

        if self.export.max_date_range_days <= 0 {
            return Err(OsosyncError::validation(
                "export.max_date_range_days",
                "Must be positive",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.token.refresh_interval_secs, 180);
        assert_eq!(config.import.sweep_months, 24);
        assert_eq!(config.import.request_delay_ms, 500);
        assert_eq!(config.api.page_size, 1000);
        assert!(config.import.auto_import_enabled);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        // Test invalid grant
        config.token.grant = "password".to_string();
        assert!(config.validate().is_err());

        // Reset and test out-of-range freshness factor
        config = Config::default();
        config.token.freshness_factor = 1.5;
        assert!(config.validate().is_err());

        // Reset and test empty base URL
        config = Config::default();
        config.api.base_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.import.sweep_months, deserialized.import.sweep_months);
        assert_eq!(config.token.grant, deserialized.token.grant);
    }
}
