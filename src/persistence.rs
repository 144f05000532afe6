//! Durable side-channel for the rotating refresh token
//!
//! The provider issues single-use refresh tokens: every refresh exchange
//! returns a new one that replaces the previous. This module persists the
//! current token across restarts so the refresh-token grant can resume.

use crate::error::Result;
use crate::logging::get_logger;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk representation of the rotating refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRefreshToken {
    refresh_token: String,
    updated_at: String,
}

/// File-backed store for the rotating refresh token
pub struct RefreshTokenStore {
    file_path: String,
    logger: crate::logging::StructuredLogger,
}

impl RefreshTokenStore {
    /// Create a new store over the given file path
    pub fn new(file_path: &str) -> Self {
        let logger = get_logger("persistence");
        Self {
            file_path: file_path.to_string(),
            logger,
        }
    }

    /// Load the current refresh token, if one has been persisted
    pub fn load(&self) -> Result<Option<String>> {
        let path = Path::new(&self.file_path);

        if !path.exists() {
            self.logger.info("No refresh token file found");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)?;
        let stored: StoredRefreshToken = serde_json::from_str(&contents)?;
        if stored.refresh_token.is_empty() {
            return Ok(None);
        }
        self.logger.debug("Loaded refresh token from disk");
        Ok(Some(stored.refresh_token))
    }

    /// Persist a newly issued refresh token, replacing the previous one
    pub fn save(&self, refresh_token: &str) -> Result<()> {
        let stored = StoredRefreshToken {
            refresh_token: refresh_token.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.file_path, contents)?;
        self.logger.debug("Saved rotated refresh token to disk");

        Ok(())
    }
}
