//! # Ososync - OSOS hourly consumption importer
//!
//! A Rust service that keeps a local store of hourly electricity
//! consumption in sync with the AYEDAS OSOS portal: it maintains a
//! short-lived bearer credential, sweeps every metering installation
//! across a configurable month window against the rate-limited portal
//! API, and reconciles the readings into SQLite with a natural-key upsert.
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `error`: Application-wide error taxonomy
//! - `auth`: Credential store, token exchange, periodic refresh
//! - `api`: Portal API clients and wire-shape normalization
//! - `store`: SQLite consumption store and reading reconciliation
//! - `importer`: Sweep orchestration and scheduling
//! - `persistence`: Durable rotating refresh-token file

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod importer;
pub mod logging;
pub mod persistence;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{OsosyncError, Result};
pub use importer::{ImportOrchestrator, ImportResult, ImportScheduler};
