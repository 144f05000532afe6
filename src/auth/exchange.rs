//! Token exchange against the provider's OAuth endpoint
//!
//! Two grant flavors are supported. The client-credentials flavor sends the
//! parameters as a query string with an empty body and falls back to a
//! form-encoded body when the endpoint rejects the first attempt (the
//! provider has historically accepted only one of the two). The
//! refresh-token flavor exchanges the persisted rotating token and stores
//! the newly issued one immediately, since each refresh token is single-use.

use crate::config::TokenConfig;
use crate::error::{OsosyncError, Result};
use crate::logging::get_logger;
use crate::persistence::RefreshTokenStore;
use async_trait::async_trait;

use super::types::TokenResponse;

const EXCHANGE_TIMEOUT_SECS: u64 = 10;
const USER_AGENT_VALUE: &str = concat!("ososync/", env!("CARGO_PKG_VERSION"));

/// Seam for issuing a fresh token response
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Perform one exchange against the token endpoint
    async fn exchange(&self) -> Result<TokenResponse>;
}

/// HTTP implementation speaking the provider's OAuth endpoint
pub struct HttpTokenExchange {
    http: reqwest::Client,
    config: TokenConfig,
    refresh_tokens: RefreshTokenStore,
    logger: crate::logging::StructuredLogger,
}

impl HttpTokenExchange {
    /// Build an exchanger for the configured grant flavor
    pub fn new(config: TokenConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(EXCHANGE_TIMEOUT_SECS))
            .build()?;
        let refresh_tokens = RefreshTokenStore::new(&config.refresh_token_file);
        let logger = get_logger("auth");

        Ok(Self {
            http,
            config,
            refresh_tokens,
            logger,
        })
    }

    async fn exchange_client_credentials(&self) -> Result<TokenResponse> {
        use reqwest::header::{ACCEPT, USER_AGENT};

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("consumerID", self.config.consumer_id.as_str()),
        ];

        // First attempt: parameters on the query string, empty body
        let response = self
            .http
            .post(&self.config.url)
            .query(&params)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        if response.status().is_success() {
            return Self::decode(response).await;
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        self.logger.warn(&format!(
            "Token request via query parameters failed (HTTP {}), retrying form-encoded: {}",
            status, body
        ));

        // Second attempt: same parameters as a form body
        let response = self
            .http
            .post(&self.config.url)
            .form(&params)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OsosyncError::auth(format!(
                "token exchange failed (HTTP {}): {}",
                status, body
            )));
        }

        Self::decode(response).await
    }

    async fn exchange_refresh_token(&self) -> Result<TokenResponse> {
        use reqwest::header::{ACCEPT, USER_AGENT};

        let Some(refresh_token) = self.refresh_tokens.load()? else {
            // An operator has to seed the file; retrying cannot help
            return Err(OsosyncError::config(format!(
                "no refresh token available in {}",
                self.config.refresh_token_file
            )));
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.url)
            .form(&params)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OsosyncError::auth(format!(
                "refresh token exchange failed (HTTP {}): {}",
                status, body
            )));
        }

        let token = Self::decode(response).await?;

        // Refresh tokens rotate; persist the replacement before anything else
        // can fail, or the next exchange would replay a dead token.
        if let Some(rotated) = token.refresh_token.as_deref()
            && !rotated.is_empty()
        {
            self.refresh_tokens.save(rotated)?;
        }

        Ok(token)
    }

    async fn decode(response: reqwest::Response) -> Result<TokenResponse> {
        let token: TokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(OsosyncError::auth("token response carried no access token"));
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(&self) -> Result<TokenResponse> {
        match self.config.grant.as_str() {
            "client_credentials" => self.exchange_client_credentials().await,
            "refresh_token" => self.exchange_refresh_token().await,
            other => Err(OsosyncError::config(format!(
                "unsupported grant flavor: {}",
                other
            ))),
        }
    }
}
