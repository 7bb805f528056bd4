// Runs against a real Postgres only when SAMLAND_TEST_DATABASE_URL is set.

use samland_core::{FetchOutcome, FetchStatus, PostedWindow};
use samland_storage::{
    audit, count_raw_rows, ensure_schema, write_audit, write_raw, PgExecutor, StoreError,
    RAW_TABLE,
};
use serial_test::serial;
use sqlx::Row;

async fn connect() -> Option<PgExecutor> {
    let url = std::env::var("SAMLAND_TEST_DATABASE_URL").ok()?;
    Some(PgExecutor::connect(&url).await.expect("connect test database"))
}

#[tokio::test]
#[serial]
async fn schema_bootstrap_is_idempotent() {
    let Some(mut executor) = connect().await else {
        return;
    };

    ensure_schema(&mut executor).await.expect("first bootstrap");
    ensure_schema(&mut executor).await.expect("second bootstrap");

    let columns: Vec<(String, String)> = sqlx::query(
        "SELECT column_name::text AS column_name, is_nullable::text AS is_nullable \
         FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position",
    )
    .bind(RAW_TABLE)
    .fetch_all(executor.connection())
    .await
    .expect("columns")
    .iter()
    .map(|row| (row.get("column_name"), row.get("is_nullable")))
    .collect();

    let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        ["id", "source_name", "raw_payload", "status", "error_message", "created_at"]
    );
    let nullable: Vec<&str> = columns
        .iter()
        .filter(|(_, nullable)| nullable == "YES")
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(nullable, ["error_message"]);

    executor.close().await;
}

#[tokio::test]
#[serial]
async fn failed_and_successful_runs_both_land() {
    let Some(mut executor) = connect().await else {
        return;
    };
    ensure_schema(&mut executor).await.expect("bootstrap");
    let before = count_raw_rows(&mut executor).await.expect("count");

    let window = PostedWindow::new("02/15/2026", "02/22/2026");
    let ok = FetchOutcome::from_response(200, r#"{"opportunitiesData":[]}"#.into());
    let failed = FetchOutcome::transport_failure(None, "connection refused");

    assert_eq!(write_raw(&mut executor, &ok).await.expect("raw ok"), 1);
    assert_eq!(write_raw(&mut executor, &failed).await.expect("raw failed"), 1);
    write_audit(&mut executor, &failed, &window).await.expect("audit");

    assert_eq!(count_raw_rows(&mut executor).await.expect("count"), before + 2);

    let latest = audit::recent_entries(&mut executor, 1).await.expect("recent");
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].status_code, "ERROR");
    assert!(!latest[0].was_success);
    assert_eq!(latest[0].posted_from, "02/15/2026");

    let status: String = sqlx::query_scalar(&format!(
        "SELECT status FROM {RAW_TABLE} ORDER BY id DESC LIMIT 1"
    ))
    .fetch_one(executor.connection())
    .await
    .expect("status");
    assert_eq!(status, FetchStatus::Failed.as_str());

    executor.close().await;
}

#[tokio::test]
#[serial]
async fn non_json_body_is_rejected_by_the_store() {
    let Some(mut executor) = connect().await else {
        return;
    };
    ensure_schema(&mut executor).await.expect("bootstrap");

    let outcome = FetchOutcome::from_response(502, "<html>Bad Gateway</html>".into());
    let err = write_raw(&mut executor, &outcome).await.unwrap_err();
    assert!(matches!(err, StoreError::Write { .. }));

    executor.close().await;
}

#[tokio::test]
#[serial]
async fn upgrade_keeps_rows_landed_before_failure_tracking() {
    let Some(mut executor) = connect().await else {
        return;
    };

    // Raw table as first released, before status/error_message existed.
    for sql in [
        format!("DROP TABLE IF EXISTS {RAW_TABLE}"),
        format!(
            "CREATE TABLE {RAW_TABLE} (
                id BIGSERIAL PRIMARY KEY,
                source_name TEXT NOT NULL,
                raw_payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"
        ),
        format!(
            "INSERT INTO {RAW_TABLE} (source_name, raw_payload) VALUES ('sam.gov', '{{\"a\": 1}}')"
        ),
    ] {
        sqlx::query(&sql)
            .execute(executor.connection())
            .await
            .expect("legacy setup");
    }

    ensure_schema(&mut executor).await.expect("upgrade");
    ensure_schema(&mut executor).await.expect("second upgrade");

    let row = sqlx::query(&format!(
        "SELECT raw_payload::text AS payload, status, error_message FROM {RAW_TABLE}"
    ))
    .fetch_one(executor.connection())
    .await
    .expect("legacy row");
    let payload: String = row.get("payload");
    let status: String = row.get("status");
    let error_message: Option<String> = row.get("error_message");
    assert_eq!(payload, r#"{"a": 1}"#);
    assert_eq!(status, FetchStatus::Success.as_str());
    assert_eq!(error_message, None);
    assert_eq!(count_raw_rows(&mut executor).await.expect("count"), 1);

    executor.close().await;
}
