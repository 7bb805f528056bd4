//! Run orchestration: ensure schema → fetch → land raw → audit → report.

use std::fmt;

use chrono::{DateTime, Utc};
use samland_core::{AuditRecord, FetchOutcome, PostedWindow, SOURCE_NAME};
use samland_storage::{
    audit, count_raw_rows, ensure_schema, write_audit, write_raw, HttpClientConfig, PgExecutor,
    ReqwestTransport, SchemaError, SqlExecutor, StoreError,
};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ConfigError, IngestConfig};
use crate::fetcher::Fetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    SchemaReady,
    Fetched,
    RawPersisted,
    AuditPersisted,
    Reported,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Every way a run can go wrong. `Config`, `Connect` and `Schema` abort the
/// run; the rest are collected in [`RunReport::issues`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database connection error: {0}")]
    Connect(#[source] StoreError),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("api responded with HTTP {0}")]
    HttpStatus(u16),
    #[error("raw store write error: {0}")]
    RawWrite(#[source] StoreError),
    #[error("audit log write error: {0}")]
    AuditWrite(#[source] StoreError),
    #[error("read error: {0}")]
    Read(#[source] StoreError),
}

impl IngestError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Connect(_) | Self::Schema(_))
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    pub window: PostedWindow,
    pub outcome: FetchOutcome,
    pub raw_rows_written: u64,
    pub audit_written: bool,
    /// Raw store total after the run; `None` when the count query failed.
    pub total_raw_rows: Option<i64>,
    pub issues: Vec<IngestError>,
}

pub struct IngestPipeline {
    config: IngestConfig,
    fetcher: Fetcher,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig, fetcher: Fetcher) -> Self {
        Self { config, fetcher }
    }

    pub fn from_config(config: IngestConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(HttpClientConfig {
            user_agent: Some(config.user_agent.clone()),
        })
        .map_err(ConfigError::Client)?;
        let fetcher = Fetcher::new(Box::new(transport), config.api_base_url.clone());
        Ok(Self::new(config, fetcher))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Execute one run against `store`. Only a schema failure is returned as
    /// an error; every later failure is reported in the [`RunReport`].
    pub async fn run_once<E: SqlExecutor + ?Sized>(
        &self,
        store: &mut E,
    ) -> Result<RunReport, IngestError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest_run", %run_id, source = SOURCE_NAME);
        self.run_steps(run_id, store).instrument(span).await
    }

    async fn run_steps<E: SqlExecutor + ?Sized>(
        &self,
        run_id: Uuid,
        store: &mut E,
    ) -> Result<RunReport, IngestError> {
        let started_at = Utc::now();
        let mut state = RunState::Init;
        let mut issues = Vec::new();

        if let Err(err) = ensure_schema(store).await {
            error!(error = %err, "schema bootstrap failed; aborting before fetch");
            advance(&mut state, RunState::Aborted);
            return Err(IngestError::Schema(err));
        }
        advance(&mut state, RunState::SchemaReady);

        let window = self.fetcher.resolve_window(
            self.config.posted_from.as_deref(),
            self.config.posted_to.as_deref(),
        );
        let request = self.fetcher.build_request(&self.config.api_key, &window);
        info!(window = %window, url = %request.redacted_url(), "fetching");
        let outcome = self.fetcher.execute(&request).await;
        if let Some(transport_error) = &outcome.transport_error {
            issues.push(IngestError::Transport(transport_error.clone()));
        } else if let (false, Some(code)) = (outcome.is_success, outcome.status_code) {
            issues.push(IngestError::HttpStatus(code));
        }
        advance(&mut state, RunState::Fetched);

        let raw_rows_written = match write_raw(store, &outcome).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "raw payload not landed; continuing to audit");
                issues.push(IngestError::RawWrite(err));
                0
            }
        };
        advance(&mut state, RunState::RawPersisted);

        let audit_written = match write_audit(store, &outcome, &window).await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "fetch attempt not audited");
                issues.push(IngestError::AuditWrite(err));
                false
            }
        };
        advance(&mut state, RunState::AuditPersisted);

        let total_raw_rows = match count_raw_rows(store).await {
            Ok(total) => Some(total),
            Err(err) => {
                warn!(error = %err, "raw store count unavailable");
                issues.push(IngestError::Read(err));
                None
            }
        };
        advance(&mut state, RunState::Reported);

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            state,
            window,
            outcome,
            raw_rows_written,
            audit_written,
            total_raw_rows,
            issues,
        };
        info!(
            fetch_status = %report.outcome.status(),
            raw_rows_written = report.raw_rows_written,
            audit_written = report.audit_written,
            issues = report.issues.len(),
            "run complete"
        );
        Ok(report)
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "run state transition");
    *state = next;
}

/// Acquire the run's connection, run once, and release the connection on
/// every path.
pub async fn run_once_from_config(config: IngestConfig) -> Result<RunReport, IngestError> {
    let pipeline = IngestPipeline::from_config(config)?;
    let mut store = PgExecutor::connect(&pipeline.config().database_url)
        .await
        .map_err(IngestError::Connect)?;
    let result = pipeline.run_once(&mut store).await;
    store.close().await;
    result
}

/// Connect and bootstrap the schema without fetching.
pub async fn migrate_from_config(config: &IngestConfig) -> Result<(), IngestError> {
    let mut store = PgExecutor::connect(&config.database_url)
        .await
        .map_err(IngestError::Connect)?;
    let result = ensure_schema(&mut store).await.map_err(IngestError::from);
    store.close().await;
    result
}

#[derive(Debug)]
pub struct LandingReport {
    pub total_raw_rows: i64,
    pub recent_audit: Vec<AuditRecord>,
}

/// Raw store total plus the `runs` most recent audit entries.
pub async fn report_from_config(
    config: &IngestConfig,
    runs: usize,
) -> Result<LandingReport, IngestError> {
    let mut store = PgExecutor::connect(&config.database_url)
        .await
        .map_err(IngestError::Connect)?;
    let result = async {
        let total_raw_rows = count_raw_rows(&mut store).await?;
        let recent_audit = audit::recent_entries(&mut store, runs.max(1) as i64).await?;
        Ok::<_, StoreError>(LandingReport {
            total_raw_rows,
            recent_audit,
        })
    }
    .await
    .map_err(IngestError::Read);
    store.close().await;
    result
}
