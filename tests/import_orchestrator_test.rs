use async_trait::async_trait;
use ososync::api::types::{Installation, Reading};
use ososync::api::{ConsumptionSource, InstallationDirectory};
use ososync::auth::{Credential, CredentialStore, TokenExchange, TokenResponse};
use ososync::config::ImportConfig;
use ososync::error::{OsosyncError, Result};
use ososync::importer::ImportOrchestrator;
use ososync::store::{ConsumptionStore, ReadingReconciler};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;

struct OkExchange {
    calls: AtomicU32,
}

#[async_trait]
impl TokenExchange for OkExchange {
    async fn exchange(&self) -> Result<TokenResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TokenResponse {
            access_token: format!("token-{}", call),
            expires_in: 240,
            refresh_expires_in: 1800,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            id_token: None,
            session_state: None,
            scope: None,
        })
    }
}

struct StaticDirectory {
    installations: Vec<Installation>,
}

#[async_trait]
impl InstallationDirectory for StaticDirectory {
    async fn list(&self, _credential: &Credential) -> Result<Vec<Installation>> {
        Ok(self.installations.clone())
    }
}

/// Source double: scripted per-installation behavior, counting fetches
/// through a handle the test keeps.
struct ScriptedSource {
    fetches: Arc<AtomicU32>,
    /// Installation numbers whose fetch always fails with HTTP 500
    failing: Vec<String>,
    /// Readings returned for every other installation-month
    readings: Vec<Reading>,
    /// Answer 401 for the first N fetch calls
    unauthorized_first: u32,
}

impl ScriptedSource {
    fn returning(readings: Vec<Reading>) -> (Self, Arc<AtomicU32>) {
        let fetches = Arc::new(AtomicU32::new(0));
        (
            Self {
                fetches: fetches.clone(),
                failing: Vec::new(),
                readings,
                unauthorized_first: 0,
            },
            fetches,
        )
    }
}

#[async_trait]
impl ConsumptionSource for ScriptedSource {
    async fn fetch(
        &self,
        _credential: &Credential,
        installation: &Installation,
        _month: u32,
        _year: i32,
    ) -> Result<Vec<Reading>> {
        let call = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.unauthorized_first {
            return Err(OsosyncError::api(401, "token expired"));
        }
        if self.failing.contains(&installation.number) {
            return Err(OsosyncError::api(500, "meter head-end offline"));
        }
        Ok(self.readings.clone())
    }
}

fn installation(number: &str, natural_code: Option<&str>) -> Installation {
    Installation {
        number: number.to_string(),
        natural_code: natural_code.map(str::to_string),
        display_name: String::new(),
    }
}

fn reading(timestamp: &str, consumption: &str) -> Reading {
    Reading {
        natural_code: Some("TR00123".to_string()),
        installation_number: "4003829127".to_string(),
        meter_serial: None,
        timestamp: timestamp.to_string(),
        consumption: consumption.to_string(),
        period: "2025-01".to_string(),
    }
}

fn test_config(sweep_months: u32) -> ImportConfig {
    ImportConfig {
        auto_import_enabled: true,
        initial_delay_minutes: 0,
        refresh_interval_hours: 24,
        sweep_months,
        request_delay_ms: 0,
        distribution_company: "AYEDAS".to_string(),
    }
}

fn orchestrator(
    directory: StaticDirectory,
    source: ScriptedSource,
    sweep_months: u32,
) -> (
    ImportOrchestrator<StaticDirectory, ScriptedSource>,
    Arc<OkExchange>,
) {
    let exchange = Arc::new(OkExchange {
        calls: AtomicU32::new(0),
    });
    let credentials = Arc::new(CredentialStore::new(exchange.clone(), 0.5));
    let mut store = ConsumptionStore::open_in_memory().unwrap();
    store.migrate().unwrap();
    let reconciler = ReadingReconciler::new(store, "AYEDAS");
    (
        ImportOrchestrator::new(
            credentials,
            directory,
            source,
            reconciler,
            test_config(sweep_months),
        ),
        exchange,
    )
}

#[tokio::test]
async fn sweep_reconciles_fetched_readings() {
    let directory = StaticDirectory {
        installations: vec![installation("4003829127", Some("TR00123"))],
    };
    let (source, _fetches) = ScriptedSource::returning(vec![
        reading("01-01-2025 00:00", "10.5"),
        reading("01-01-2025 01:00", "11.0"),
    ]);

    let (orchestrator, _) = orchestrator(directory, source, 1);
    let (_tx, mut cancel) = watch::channel(false);

    let result = orchestrator.run_sweep(&mut cancel).await.unwrap();
    assert_eq!(result.success_count, 2);
    assert_eq!(result.error_count, 0);

    let store = orchestrator.reconciler().store();
    assert_eq!(store.count_rows().unwrap(), 2);
    assert_eq!(
        store.value_for_key("TR00123", 2025, 1, 1, 0).unwrap(),
        Some(10.50)
    );
    assert_eq!(
        store.value_for_key("TR00123", 2025, 1, 1, 1).unwrap(),
        Some(11.00)
    );
}

#[tokio::test]
async fn one_failing_installation_does_not_abort_the_sweep() {
    let directory = StaticDirectory {
        installations: vec![
            installation("1111111111", None),
            installation("4003829127", Some("TR00123")),
        ],
    };
    let (mut source, _fetches) =
        ScriptedSource::returning(vec![reading("01-01-2025 00:00", "10.5")]);
    source.failing = vec!["1111111111".to_string()];

    let (orchestrator, _) = orchestrator(directory, source, 1);
    let (_tx, mut cancel) = watch::channel(false);

    let result = orchestrator.run_sweep(&mut cancel).await.unwrap();
    assert_eq!(result.success_count, 1);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("1111111111"));
}

#[tokio::test]
async fn unauthorized_fetch_is_retried_once_after_forced_refresh() {
    let directory = StaticDirectory {
        installations: vec![installation("4003829127", Some("TR00123"))],
    };
    let (mut source, fetches) =
        ScriptedSource::returning(vec![reading("01-01-2025 00:00", "10.5")]);
    source.unauthorized_first = 1;

    let (orchestrator, exchange) = orchestrator(directory, source, 1);
    let (_tx, mut cancel) = watch::channel(false);

    let result = orchestrator.run_sweep(&mut cancel).await.unwrap();
    assert_eq!(result.success_count, 1);
    assert_eq!(result.error_count, 0);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);

    // Initial issuance plus the forced refresh triggered by the 401
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sustained_unauthorized_fails_the_unit_after_one_retry() {
    let directory = StaticDirectory {
        installations: vec![installation("4003829127", Some("TR00123"))],
    };
    let (mut source, fetches) =
        ScriptedSource::returning(vec![reading("01-01-2025 00:00", "10.5")]);
    source.unauthorized_first = u32::MAX;

    let (orchestrator, _) = orchestrator(directory, source, 1);
    let (_tx, mut cancel) = watch::channel(false);

    let result = orchestrator.run_sweep(&mut cancel).await.unwrap();
    assert_eq!(result.success_count, 0);
    assert_eq!(result.error_count, 1);

    // Bounded: first attempt plus exactly one retry
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_installation_list_aborts_the_run() {
    let directory = StaticDirectory {
        installations: Vec::new(),
    };
    let (source, _fetches) = ScriptedSource::returning(Vec::new());

    let (orchestrator, _) = orchestrator(directory, source, 1);
    let (_tx, mut cancel) = watch::channel(false);

    assert!(orchestrator.run_sweep(&mut cancel).await.is_err());
}

#[tokio::test]
async fn cancellation_stops_the_sweep_between_units() {
    let directory = StaticDirectory {
        installations: vec![installation("4003829127", Some("TR00123"))],
    };
    let (source, fetches) = ScriptedSource::returning(vec![reading("01-01-2025 00:00", "10.5")]);

    let (orchestrator, _) = orchestrator(directory, source, 24);
    let (tx, mut cancel) = watch::channel(false);
    tx.send(true).unwrap();

    let result = orchestrator.run_sweep(&mut cancel).await.unwrap();
    assert_eq!(result.success_count, 0);
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}
