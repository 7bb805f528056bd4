//! Fetch audit log: one row per attempt, written whatever the outcome.

use chrono::{DateTime, Utc};
use samland_core::{AuditRecord, FetchOutcome, PostedWindow, SOURCE_NAME};
use sqlx::Row;
use tracing::info;

use crate::{PgExecutor, SqlExecutor, SqlParam, Statement, StoreError, AUDIT_TABLE};

pub fn insert_statement(outcome: &FetchOutcome, window: &PostedWindow) -> Statement {
    Statement::new(format!(
        "INSERT INTO {AUDIT_TABLE} (source_name, status_code, was_success, posted_from, posted_to) \
         VALUES ($1, $2, $3, $4, $5)"
    ))
    .bind(SqlParam::Text(SOURCE_NAME.to_string()))
    .bind(SqlParam::Text(outcome.status_code_text()))
    .bind(SqlParam::Bool(outcome.is_success))
    .bind(SqlParam::Text(window.from.clone()))
    .bind(SqlParam::Text(window.to.clone()))
}

pub async fn write_audit<E: SqlExecutor + ?Sized>(
    executor: &mut E,
    outcome: &FetchOutcome,
    window: &PostedWindow,
) -> Result<(), StoreError> {
    executor
        .execute(&insert_statement(outcome, window))
        .await
        .map_err(|source| StoreError::Write {
            table: AUDIT_TABLE,
            source,
        })?;

    info!(
        status_code = %outcome.status_code_text(),
        was_success = outcome.is_success,
        window = %window,
        "fetch attempt audited"
    );
    Ok(())
}

/// Most recent audit entries, newest first.
pub async fn recent_entries(
    executor: &mut PgExecutor,
    limit: i64,
) -> Result<Vec<AuditRecord>, StoreError> {
    let read_err = |source| StoreError::Read {
        table: AUDIT_TABLE,
        source,
    };

    let sql = format!(
        "SELECT id, source_name, status_code, was_success, posted_from, posted_to, fetched_at \
         FROM {AUDIT_TABLE} ORDER BY fetched_at DESC, id DESC LIMIT $1"
    );
    let rows = sqlx::query(&sql)
        .bind(limit.max(0))
        .fetch_all(executor.connection())
        .await
        .map_err(read_err)?;

    rows.iter()
        .map(|row| {
            Ok(AuditRecord {
                id: row.try_get("id")?,
                source_name: row.try_get("source_name")?,
                status_code: row.try_get("status_code")?,
                was_success: row.try_get("was_success")?,
                posted_from: row.try_get("posted_from")?,
                posted_to: row.try_get("posted_to")?,
                fetched_at: row.try_get::<DateTime<Utc>, _>("fetched_at")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(read_err)
}
