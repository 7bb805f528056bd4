//! Core domain model for the samland landing job.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "samland-core";

/// Origin identifier written to every landed row.
pub const SOURCE_NAME: &str = "sam.gov";

/// Fixed page size sent as the `limit` query parameter.
pub const PAGE_LIMIT: u32 = 1000;

/// Audit `status_code` value used when no HTTP status was ever received.
pub const STATUS_CODE_SENTINEL: &str = "ERROR";

/// Marker stored in `error_message` for failed fetches.
pub const FAILED_FETCH_MESSAGE: &str = "SAM.gov API request failed";

/// Date format the remote API expects for `postedFrom` / `postedTo`.
pub const POSTED_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    Success,
    Failed,
}

impl FetchStatus {
    pub fn from_success(is_success: bool) -> Self {
        if is_success {
            Self::Success
        } else {
            Self::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved `postedFrom` / `postedTo` pair, kept exactly as sent to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedWindow {
    pub from: String,
    pub to: String,
}

impl PostedWindow {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for PostedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Classified result of the single API call made by a run.
///
/// A transport failure is still an outcome: it carries `is_success = false`
/// so the failed attempt can be landed and audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// HTTP status, when a status line was received at all.
    pub status_code: Option<u16>,
    pub body: String,
    pub is_success: bool,
    pub transport_error: Option<String>,
}

impl FetchOutcome {
    pub fn from_response(status_code: u16, body: String) -> Self {
        Self {
            status_code: Some(status_code),
            body,
            is_success: (200..300).contains(&status_code),
            transport_error: None,
        }
    }

    pub fn transport_failure(status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            status_code,
            body: String::new(),
            is_success: false,
            transport_error: Some(error.into()),
        }
    }

    pub fn status(&self) -> FetchStatus {
        FetchStatus::from_success(self.is_success)
    }

    /// Status rendered for the audit log; the sentinel when none was obtained.
    pub fn status_code_text(&self) -> String {
        self.status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| STATUS_CODE_SENTINEL.to_string())
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self.status() {
            FetchStatus::Success => None,
            FetchStatus::Failed => Some(FAILED_FETCH_MESSAGE),
        }
    }
}

/// One row of the raw store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    pub source_name: String,
    pub raw_payload: String,
    pub status: FetchStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of the fetch audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub source_name: String,
    pub status_code: String,
    pub was_success: bool,
    pub posted_from: String,
    pub posted_to: String,
    pub fetched_at: DateTime<Utc>,
}
