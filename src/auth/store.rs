//! Guarded owner of the live credential
//!
//! The credential is the only value in the process mutated by more than one
//! logical actor (the background refresher and the import path). It lives
//! behind this store: reads hand out whole snapshots, refreshes are
//! single-flight, and a failed refresh never clobbers the previous value.

use crate::error::{OsosyncError, Result};
use crate::logging::get_logger;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

use super::exchange::TokenExchange;
use super::types::Credential;

/// Holds the current credential and coordinates refreshes
pub struct CredentialStore {
    exchange: Arc<dyn TokenExchange>,
    freshness_factor: f64,
    current: RwLock<Option<Credential>>,
    /// Bumped after every successful refresh; lets a waiter that queued
    /// behind an in-flight refresh adopt its result instead of firing a
    /// second exchange.
    generation: AtomicU64,
    refresh_gate: Mutex<()>,
    logger: crate::logging::StructuredLogger,
}

impl CredentialStore {
    /// Create a store over the given exchange seam
    pub fn new(exchange: Arc<dyn TokenExchange>, freshness_factor: f64) -> Self {
        Self {
            exchange,
            freshness_factor,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            refresh_gate: Mutex::new(()),
            logger: get_logger("auth"),
        }
    }

    /// Return the current credential if it is still fresh.
    ///
    /// Never triggers a refresh; callers that receive `None` decide whether
    /// to force one.
    pub async fn read(&self) -> Option<Credential> {
        let guard = self.current.read().await;
        match guard.as_ref() {
            Some(credential) if credential.is_fresh_at(Utc::now(), self.freshness_factor) => {
                Some(credential.clone())
            }
            _ => None,
        }
    }

    /// Refresh the credential, coalescing concurrent callers.
    ///
    /// With `force` unset, a still-fresh credential is returned without any
    /// network traffic. Otherwise exactly one exchange is in flight at a
    /// time; callers that arrive while it runs wait for its outcome and
    /// share the resulting credential.
    pub async fn refresh(&self, force: bool) -> Result<Credential> {
        if !force && let Some(credential) = self.read().await {
            return Ok(credential);
        }

        let generation_before = self.generation.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;

        // Someone else finished a refresh while we waited for the gate
        if self.generation.load(Ordering::Acquire) != generation_before {
            let guard = self.current.read().await;
            if let Some(credential) = guard.as_ref() {
                return Ok(credential.clone());
            }
        }

        self.logger.debug("Refreshing credential");
        let response = match self.exchange.exchange().await {
            Ok(response) => response,
            Err(err @ (OsosyncError::Config { .. } | OsosyncError::Auth { .. })) => {
                // A missing refresh token is an operator problem, not an
                // auth failure; keep the distinction visible upstream.
                self.logger
                    .error(&format!("Credential refresh failed: {}", err));
                return Err(err);
            }
            Err(err) => {
                self.logger
                    .error(&format!("Credential refresh failed: {}", err));
                return Err(OsosyncError::auth(err.to_string()));
            }
        };

        let credential = Credential::from_response(&response, Utc::now())?;
        self.logger.info(&format!(
            "Credential refreshed ({}, valid {} s)",
            credential.preview(),
            credential.valid_for_secs
        ));

        *self.current.write().await = Some(credential.clone());
        self.generation.fetch_add(1, Ordering::Release);

        Ok(credential)
    }
}
