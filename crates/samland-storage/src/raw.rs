//! Raw store writer: one immutable row per run holding the response body.

use samland_core::{FetchOutcome, SOURCE_NAME};
use tracing::info;

use crate::{sha256_hex, SqlExecutor, SqlParam, Statement, StoreError, RAW_TABLE};

/// JSON document landed when a transport failure produced no body at all.
pub const EMPTY_BODY_DOCUMENT: &str = "null";

/// The payload is cast to JSONB by the store; a body that is not valid JSON is
/// rejected there and surfaces as [`StoreError::Write`]. Any received body,
/// even an empty one, is passed through untouched.
pub fn insert_statement(outcome: &FetchOutcome) -> Statement {
    let payload = if outcome.transport_error.is_some() && outcome.body.is_empty() {
        EMPTY_BODY_DOCUMENT.to_string()
    } else {
        outcome.body.clone()
    };

    Statement::new(format!(
        "INSERT INTO {RAW_TABLE} (source_name, raw_payload, status, error_message) \
         VALUES ($1, $2::jsonb, $3, $4)"
    ))
    .bind(SqlParam::Text(SOURCE_NAME.to_string()))
    .bind(SqlParam::Text(payload))
    .bind(SqlParam::Text(outcome.status().as_str().to_string()))
    .bind(SqlParam::NullableText(
        outcome.error_message().map(str::to_string),
    ))
}

/// Land the outcome in the raw store and return the rows written.
pub async fn write_raw<E: SqlExecutor + ?Sized>(
    executor: &mut E,
    outcome: &FetchOutcome,
) -> Result<u64, StoreError> {
    let statement = insert_statement(outcome);
    let rows = executor
        .execute(&statement)
        .await
        .map_err(|source| StoreError::Write {
            table: RAW_TABLE,
            source,
        })?;

    info!(
        rows,
        status = %outcome.status(),
        payload_bytes = outcome.body.len(),
        payload_sha256 = %sha256_hex(outcome.body.as_bytes()),
        "raw payload landed"
    );
    Ok(rows)
}
