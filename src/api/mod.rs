//! OSOS portal API surface consumed by the importer
//!
//! The portal has answered with two different JSON shapes per logical
//! endpoint over its lifetime; both are decoded here by shape-detecting
//! types rather than separate code paths in the callers.

pub mod client;
pub mod consumption;
pub mod installations;
pub mod types;

pub use client::ApiClient;
pub use consumption::{ConsumptionSource, HttpConsumptionSource, parse_meter_timestamp};
pub use installations::{HttpInstallationDirectory, InstallationDirectory};
pub use types::{ConsumptionResponse, Installation, InstallationPage, Reading};
