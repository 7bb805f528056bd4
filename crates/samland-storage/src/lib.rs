//! Append-only landing tables + HTTP transport for samland.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Connection, PgConnection};
use thiserror::Error;

pub mod audit;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod raw;
pub mod schema;

pub use audit::write_audit;
pub use http::{
    HttpClientConfig, HttpResponse, ReqwestTransport, StatusCode, Transport, TransportError,
};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryExecutor;
pub use raw::write_raw;
pub use schema::{ensure_schema, SchemaError};

pub const CRATE_NAME: &str = "samland-storage";

pub const RAW_TABLE: &str = "raw_opportunities";
pub const AUDIT_TABLE: &str = "fetch_audit_log";

/// A bound value for a positional (`$n`) statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    NullableText(Option<String>),
    Bool(bool),
}

impl SqlParam {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::NullableText(value) => value.as_deref(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: SqlParam) -> Self {
        self.params.push(param);
        self
    }
}

/// The persistence capability the landing job runs against.
#[async_trait]
pub trait SqlExecutor: Send {
    /// Run one statement and return the number of rows it affected.
    async fn execute(&mut self, statement: &Statement) -> Result<u64, sqlx::Error>;

    /// Run a single-value `COUNT(*)`-style query.
    async fn fetch_count(&mut self, sql: &str) -> Result<i64, sqlx::Error>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connecting to database failed: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("insert into {table} failed: {source}")]
    Write {
        table: &'static str,
        source: sqlx::Error,
    },
    #[error("query against {table} failed: {source}")]
    Read {
        table: &'static str,
        source: sqlx::Error,
    },
}

/// Single Postgres connection owned by one run.
pub struct PgExecutor {
    conn: PgConnection,
}

impl PgExecutor {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let conn = PgConnection::connect(database_url)
            .await
            .map_err(StoreError::Connect)?;
        Ok(Self { conn })
    }

    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Gracefully terminate the session. Failures are logged, never returned.
    pub async fn close(self) {
        if let Err(err) = self.conn.close().await {
            tracing::warn!(error = %err, "closing database connection failed");
        }
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = match param {
                SqlParam::Text(value) => query.bind(value.as_str()),
                SqlParam::NullableText(value) => query.bind(value.as_deref()),
                SqlParam::Bool(value) => query.bind(*value),
            };
        }
        let result = query.execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_count(&mut self, sql: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&mut self.conn)
            .await
    }
}

/// Total number of rows landed in the raw store so far.
pub async fn count_raw_rows<E: SqlExecutor + ?Sized>(executor: &mut E) -> Result<i64, StoreError> {
    executor
        .fetch_count(&format!("SELECT COUNT(*) FROM {RAW_TABLE}"))
        .await
        .map_err(|source| StoreError::Read {
            table: RAW_TABLE,
            source,
        })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
