//! Bearer-authenticated HTTP client for the OSOS portal

use crate::auth::Credential;
use crate::error::{OsosyncError, Result};
use crate::logging::get_logger;
use serde::de::DeserializeOwned;

const USER_AGENT_VALUE: &str = concat!("ososync/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper around `reqwest` adding the portal's header conventions
/// and explicit status surfacing
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl ApiClient {
    /// Build a client with the configured per-request timeout
    pub fn new(request_timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            logger: get_logger("api"),
        })
    }

    /// GET a JSON document with the credential as a bearer header.
    ///
    /// Any non-2xx answer becomes an `Api` error carrying the status and
    /// body; 401 is not retried here, the import path owns that decision.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<T> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};

        self.logger.debug(&format!("GET {}", url));

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", credential.bearer))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.logger.error(&format!(
                "Portal request failed (HTTP {}): {}",
                status, body
            ));
            return Err(OsosyncError::api(status.as_u16(), body));
        }

        Ok(response.json::<T>().await?)
    }
}
