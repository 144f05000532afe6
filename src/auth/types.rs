//! Token wire format and the in-process credential snapshot

use crate::error::{OsosyncError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// JSON body returned by the provider's token endpoint for both grant flavors
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    pub expires_in: u64,

    #[serde(default)]
    pub refresh_expires_in: u64,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub token_type: String,

    #[serde(default)]
    pub id_token: Option<String>,

    #[serde(default)]
    pub session_state: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

/// Scheme the credential is presented under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Bearer,
}

/// Immutable snapshot of the current credential.
///
/// Readers always receive a clone; the stored value is only ever replaced
/// wholesale by a successful refresh.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Token presented on data requests. The data endpoints accept the id
    /// token when the provider issues one; the access token otherwise.
    pub bearer: String,

    pub kind: TokenKind,

    /// Instant the credential was issued at
    pub issued_at: DateTime<Utc>,

    /// Nominal validity window reported by the provider, in seconds
    pub valid_for_secs: u64,

    /// Rotating refresh token, when the grant flavor returns one
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Build a credential from a token response
    pub fn from_response(response: &TokenResponse, issued_at: DateTime<Utc>) -> Result<Self> {
        let bearer = match response.id_token.as_deref() {
            Some(id_token) if !id_token.is_empty() => id_token.to_string(),
            _ => response.access_token.clone(),
        };

        if bearer.is_empty() {
            return Err(OsosyncError::auth("token response carried no usable token"));
        }

        Ok(Self {
            bearer,
            kind: TokenKind::Bearer,
            issued_at,
            valid_for_secs: response.expires_in,
            refresh_token: response.refresh_token.clone(),
        })
    }

    /// Whether the credential is still considered fresh at `now`.
    ///
    /// The freshness factor scales the nominal lifetime down so a refresh
    /// happens well before the provider rejects the token: with the default
    /// factor of 0.5 a 240 s token is treated as stale after 120 s.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, freshness_factor: f64) -> bool {
        let elapsed = (now - self.issued_at).num_milliseconds();
        if elapsed < 0 {
            // Clock went backwards; keep the credential rather than thrash
            return true;
        }
        let budget_ms = self.valid_for_secs as f64 * freshness_factor * 1000.0;
        (elapsed as f64) < budget_ms
    }

    /// Truncated token text safe for log lines
    pub fn preview(&self) -> String {
        let end = self.bearer.len().min(20);
        format!("{}...", &self.bearer[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn response(access: &str, id: Option<&str>, expires_in: u64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            expires_in,
            refresh_expires_in: 1800,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            id_token: id.map(str::to_string),
            session_state: None,
            scope: None,
        }
    }

    #[test]
    fn test_bearer_prefers_id_token() {
        let issued = Utc::now();
        let cred = Credential::from_response(&response("acc", Some("idt"), 240), issued).unwrap();
        assert_eq!(cred.bearer, "idt");

        let cred = Credential::from_response(&response("acc", None, 240), issued).unwrap();
        assert_eq!(cred.bearer, "acc");

        assert!(Credential::from_response(&response("", None, 240), issued).is_err());
    }

    #[test]
    fn test_freshness_window() {
        let issued = Utc::now();
        let cred = Credential::from_response(&response("acc", None, 240), issued).unwrap();

        // Fresh immediately after issuance
        assert!(cred.is_fresh_at(issued, 0.5));
        // Still fresh just inside the margin
        assert!(cred.is_fresh_at(issued + Duration::seconds(119), 0.5));
        // Stale past the margin even though the nominal lifetime remains
        assert!(!cred.is_fresh_at(issued + Duration::seconds(121), 0.5));
        assert!(!cred.is_fresh_at(issued + Duration::seconds(500), 0.5));
    }
}
