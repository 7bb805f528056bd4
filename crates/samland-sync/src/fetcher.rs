//! Request window resolution, request building and the single API call.

use chrono::{Duration, NaiveDate, Utc};
use samland_core::{FetchOutcome, PostedWindow, PAGE_LIMIT, POSTED_DATE_FORMAT};
use samland_storage::Transport;
use tracing::{info, warn};
use url::Url;

/// Days covered by the default window, ending today.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Use both overrides verbatim (trimmed) when both are non-blank; otherwise
/// the default window `[today - 7 days, today]`.
pub fn resolve_window(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> PostedWindow {
    let from = from.map(str::trim).filter(|v| !v.is_empty());
    let to = to.map(str::trim).filter(|v| !v.is_empty());

    match (from, to) {
        (Some(from), Some(to)) => PostedWindow::new(from, to),
        _ => {
            let start = today - Duration::days(DEFAULT_WINDOW_DAYS);
            PostedWindow::new(
                start.format(POSTED_DATE_FORMAT).to_string(),
                today.format(POSTED_DATE_FORMAT).to_string(),
            )
        }
    }
}

/// A fully built GET request. The URL carries the API key, so only
/// [`ApiRequest::redacted_url`] is fit for logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    url: Url,
}

impl ApiRequest {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn redacted_url(&self) -> String {
        let mut redacted = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "api_key" { "***".into() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
        redacted.to_string()
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("url", &self.redacted_url())
            .finish()
    }
}

pub struct Fetcher {
    transport: Box<dyn Transport>,
    base_url: Url,
}

impl Fetcher {
    pub fn new(transport: Box<dyn Transport>, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    pub fn resolve_window(&self, from: Option<&str>, to: Option<&str>) -> PostedWindow {
        resolve_window(from, to, Utc::now().date_naive())
    }

    pub fn build_request(&self, api_key: &str, window: &PostedWindow) -> ApiRequest {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("api_key", api_key)
            .append_pair("postedFrom", &window.from)
            .append_pair("postedTo", &window.to)
            .append_pair("limit", &PAGE_LIMIT.to_string());
        ApiRequest { url }
    }

    /// One attempt, no retry. Transport failures become a failed outcome.
    pub async fn execute(&self, request: &ApiRequest) -> FetchOutcome {
        match self.transport.get(request.url()).await {
            Ok(resp) => {
                let status = resp.status.as_u16();
                let outcome = FetchOutcome::from_response(status, resp.body);
                if outcome.is_success {
                    info!(
                        url = %request.redacted_url(),
                        status,
                        body_bytes = outcome.body.len(),
                        "api call completed"
                    );
                } else {
                    warn!(
                        url = %request.redacted_url(),
                        status,
                        body_bytes = outcome.body.len(),
                        "api call returned non-success status"
                    );
                }
                outcome
            }
            Err(err) => {
                warn!(url = %request.redacted_url(), error = %err, "api call failed");
                FetchOutcome::transport_failure(err.status().map(|s| s.as_u16()), err.to_string())
            }
        }
    }
}
