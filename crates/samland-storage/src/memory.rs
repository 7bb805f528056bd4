//! In-memory [`SqlExecutor`] for tests.
//!
//! Records every successful statement, materializes inserts into the landing
//! tables as typed rows, and fails any statement containing a registered SQL
//! fragment.

use async_trait::async_trait;
use chrono::Utc;
use samland_core::{AuditRecord, FetchStatus, RawRecord};

use crate::{SqlExecutor, SqlParam, Statement, AUDIT_TABLE, RAW_TABLE};

#[derive(Debug, Default)]
pub struct MemoryExecutor {
    statements: Vec<Statement>,
    raw_rows: Vec<RawRecord>,
    audit_rows: Vec<AuditRecord>,
    fail_fragments: Vec<String>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement or query whose SQL contains `fragment`.
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_fragments.push(fragment.into());
        self
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn raw_rows(&self) -> &[RawRecord] {
        &self.raw_rows
    }

    pub fn audit_rows(&self) -> &[AuditRecord] {
        &self.audit_rows
    }

    fn check_failure(&self, sql: &str) -> Result<(), sqlx::Error> {
        match self.fail_fragments.iter().find(|f| sql.contains(f.as_str())) {
            Some(fragment) => Err(sqlx::Error::Protocol(format!(
                "simulated failure on `{fragment}`"
            ))),
            None => Ok(()),
        }
    }

    fn land_raw(&mut self, params: &[SqlParam]) -> Result<(), sqlx::Error> {
        let status = match text_param(params, 2)? {
            "Success" => FetchStatus::Success,
            "Failed" => FetchStatus::Failed,
            other => {
                return Err(sqlx::Error::Protocol(format!(
                    "unexpected raw status `{other}`"
                )))
            }
        };
        self.raw_rows.push(RawRecord {
            id: self.raw_rows.len() as i64 + 1,
            source_name: text_param(params, 0)?.to_string(),
            raw_payload: text_param(params, 1)?.to_string(),
            status,
            error_message: params.get(3).and_then(SqlParam::as_text).map(str::to_string),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn land_audit(&mut self, params: &[SqlParam]) -> Result<(), sqlx::Error> {
        let was_success = params
            .get(2)
            .and_then(SqlParam::as_bool)
            .ok_or_else(|| sqlx::Error::Protocol("missing boolean param $3".into()))?;
        self.audit_rows.push(AuditRecord {
            id: self.audit_rows.len() as i64 + 1,
            source_name: text_param(params, 0)?.to_string(),
            status_code: text_param(params, 1)?.to_string(),
            was_success,
            posted_from: text_param(params, 3)?.to_string(),
            posted_to: text_param(params, 4)?.to_string(),
            fetched_at: Utc::now(),
        });
        Ok(())
    }
}

fn text_param(params: &[SqlParam], index: usize) -> Result<&str, sqlx::Error> {
    params
        .get(index)
        .and_then(SqlParam::as_text)
        .ok_or_else(|| sqlx::Error::Protocol(format!("missing text param ${}", index + 1)))
}

#[async_trait]
impl SqlExecutor for MemoryExecutor {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, sqlx::Error> {
        self.check_failure(&statement.sql)?;

        let sql = statement.sql.trim_start();
        let rows = if sql.starts_with(&format!("INSERT INTO {RAW_TABLE} ")) {
            self.land_raw(&statement.params)?;
            1
        } else if sql.starts_with(&format!("INSERT INTO {AUDIT_TABLE} ")) {
            self.land_audit(&statement.params)?;
            1
        } else {
            0
        };
        self.statements.push(statement.clone());
        Ok(rows)
    }

    async fn fetch_count(&mut self, sql: &str) -> Result<i64, sqlx::Error> {
        self.check_failure(sql)?;
        if sql.contains(RAW_TABLE) {
            Ok(self.raw_rows.len() as i64)
        } else if sql.contains(AUDIT_TABLE) {
            Ok(self.audit_rows.len() as i64)
        } else {
            Err(sqlx::Error::Protocol(format!("unsupported count query: {sql}")))
        }
    }
}
