//! Idempotent schema bootstrap for the raw store and the audit log.
//!
//! Every statement is safe to run on each invocation: tables are created with
//! `IF NOT EXISTS`, and columns introduced after a table's first release are
//! added with `ADD COLUMN IF NOT EXISTS`. Migrations only ever add columns;
//! rows already landed keep their values.

use thiserror::Error;
use tracing::{debug, info};

use crate::{SqlExecutor, Statement, AUDIT_TABLE, RAW_TABLE};

#[derive(Debug, Error)]
#[error("schema step `{step}` failed: {source}")]
pub struct SchemaError {
    pub step: String,
    pub source: sqlx::Error,
}

/// A column added after its table's original definition.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMigration {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

impl ColumnMigration {
    fn sql(&self) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            self.table, self.column, self.definition
        )
    }
}

/// Additive migrations, oldest first.
pub const COLUMN_MIGRATIONS: &[ColumnMigration] = &[
    // Tables from before failure tracking only ever held successful fetches.
    ColumnMigration {
        table: RAW_TABLE,
        column: "status",
        definition: "TEXT NOT NULL DEFAULT 'Success'",
    },
    ColumnMigration {
        table: RAW_TABLE,
        column: "error_message",
        definition: "TEXT",
    },
];

fn create_raw_table_sql() -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {RAW_TABLE} (
    id BIGSERIAL PRIMARY KEY,
    source_name TEXT NOT NULL,
    raw_payload JSONB NOT NULL,
    status TEXT NOT NULL DEFAULT 'Success',
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#
    )
}

fn create_audit_table_sql() -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {AUDIT_TABLE} (
    id BIGSERIAL PRIMARY KEY,
    source_name TEXT NOT NULL,
    status_code TEXT NOT NULL,
    was_success BOOLEAN NOT NULL,
    posted_from TEXT NOT NULL,
    posted_to TEXT NOT NULL,
    fetched_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#
    )
}

fn create_audit_index_sql() -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS idx_{AUDIT_TABLE}_fetched_at ON {AUDIT_TABLE} (fetched_at DESC)"
    )
}

/// Ordered `(step, sql)` pairs making up the full bootstrap.
pub fn schema_steps() -> Vec<(String, String)> {
    let mut steps = vec![
        (format!("create {RAW_TABLE}"), create_raw_table_sql()),
        (format!("create {AUDIT_TABLE}"), create_audit_table_sql()),
    ];
    steps.extend(COLUMN_MIGRATIONS.iter().map(|migration| {
        (
            format!("add {}.{}", migration.table, migration.column),
            migration.sql(),
        )
    }));
    steps.push((
        format!("index {AUDIT_TABLE}.fetched_at"),
        create_audit_index_sql(),
    ));
    steps
}

/// Create both tables and apply additive migrations. Stops at the first
/// failing statement; nothing is retried.
pub async fn ensure_schema<E: SqlExecutor + ?Sized>(executor: &mut E) -> Result<(), SchemaError> {
    let steps = schema_steps();
    for (step, sql) in &steps {
        debug!(step = %step, "applying schema step");
        executor
            .execute(&Statement::new(sql.as_str()))
            .await
            .map_err(|source| SchemaError {
                step: step.clone(),
                source,
            })?;
    }
    info!(steps = steps.len(), "schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryExecutor;

    #[test]
    fn every_step_is_guarded() {
        for (step, sql) in schema_steps() {
            assert!(sql.contains("IF NOT EXISTS"), "unguarded step {step}: {sql}");
        }
    }

    #[test]
    fn migrations_only_add_columns() {
        for migration in COLUMN_MIGRATIONS {
            let sql = migration.sql();
            assert!(sql.starts_with("ALTER TABLE"));
            assert!(sql.contains("ADD COLUMN IF NOT EXISTS"));
            assert!(!sql.contains("DROP"));
            assert!(!sql.contains("UPDATE"));
        }
    }

    #[test]
    fn tables_are_created_before_migrations_run() {
        let steps = schema_steps();
        let first_alter = steps
            .iter()
            .position(|(_, sql)| sql.starts_with("ALTER"))
            .expect("has migrations");
        let last_create_table = steps
            .iter()
            .rposition(|(_, sql)| sql.starts_with("CREATE TABLE"))
            .expect("has tables");
        assert!(last_create_table < first_alter);
    }

    #[test]
    fn raw_table_matches_landing_contract() {
        let sql = create_raw_table_sql();
        assert!(sql.contains("id BIGSERIAL PRIMARY KEY"));
        assert!(sql.contains("raw_payload JSONB NOT NULL"));
        assert!(sql.contains("status TEXT NOT NULL DEFAULT 'Success'"));
        assert!(sql.contains("error_message TEXT,"));
        assert!(sql.contains("created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()"));
    }

    #[test]
    fn fresh_and_migrated_columns_agree() {
        let sql = create_raw_table_sql();
        for migration in COLUMN_MIGRATIONS.iter().filter(|m| m.table == RAW_TABLE) {
            let column = format!("{} {}", migration.column, migration.definition);
            assert!(sql.contains(&column), "fresh table lacks `{column}`");
        }
    }

    #[tokio::test]
    async fn running_twice_is_clean() {
        let mut executor = MemoryExecutor::new();
        ensure_schema(&mut executor).await.expect("first run");
        ensure_schema(&mut executor).await.expect("second run");

        let steps = schema_steps().len();
        assert_eq!(executor.statements().len(), steps * 2);
        assert_eq!(
            executor.statements()[..steps],
            executor.statements()[steps..]
        );
        assert!(executor.raw_rows().is_empty());
        assert!(executor.audit_rows().is_empty());
    }

    #[tokio::test]
    async fn first_failure_stops_bootstrap() {
        let mut executor = MemoryExecutor::new().fail_on(&format!("CREATE TABLE IF NOT EXISTS {RAW_TABLE}"));
        let err = ensure_schema(&mut executor).await.unwrap_err();

        assert_eq!(err.step, format!("create {RAW_TABLE}"));
        assert!(executor.statements().is_empty());
    }
}
