//! Credential lifecycle for the OSOS portal
//!
//! The provider issues short-lived bearer tokens (on the order of minutes).
//! This module keeps one continuously-valid credential available to the
//! rest of the application: a guarded store with a non-blocking read and a
//! single-flight refresh, a pluggable token-exchange seam, and a periodic
//! background refresher.

pub mod exchange;
pub mod refresher;
pub mod store;
pub mod types;

pub use exchange::{HttpTokenExchange, TokenExchange};
pub use refresher::CredentialRefresher;
pub use store::CredentialStore;
pub use types::{Credential, TokenKind, TokenResponse};
