//! Process configuration, resolved once at startup.

use std::fmt;

use thiserror::Error;
use tracing::warn;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.sam.gov/opportunities/v2/search";

/// Local-development database, used only outside production. Carries no
/// credentials; authentication comes from the local Postgres setup.
pub const LOCAL_DATABASE_URL: &str = "postgres://localhost:5432/samland";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SAM_API_KEY is missing or blank")]
    MissingApiKey,
    #[error("DATABASE_URL is required when SAMLAND_ENV=production")]
    MissingDatabaseUrl,
    #[error("SAM_API_BASE_URL `{value}` is not a valid url: {source}")]
    InvalidBaseUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("building http client failed: {0}")]
    Client(#[source] anyhow::Error),
}

#[derive(Clone)]
pub struct IngestConfig {
    pub api_key: String,
    pub database_url: String,
    pub api_base_url: Url,
    pub posted_from: Option<String>,
    pub posted_to: Option<String>,
    pub user_agent: String,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("SAM_API_KEY")
            .map(|v| v.trim().to_string())
            .ok_or(ConfigError::MissingApiKey)?;

        let production = var("SAMLAND_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None if production => return Err(ConfigError::MissingDatabaseUrl),
            None => {
                warn!(
                    database_url = LOCAL_DATABASE_URL,
                    "DATABASE_URL not set; using local development database"
                );
                LOCAL_DATABASE_URL.to_string()
            }
        };

        let base = var("SAM_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = Url::parse(base.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
            value: base.clone(),
            source,
        })?;

        Ok(Self {
            api_key,
            database_url,
            api_base_url,
            posted_from: var("POSTED_FROM"),
            posted_to: var("POSTED_TO"),
            user_agent: var("SAMLAND_USER_AGENT")
                .unwrap_or_else(|| format!("samland/{}", env!("CARGO_PKG_VERSION"))),
        })
    }

    /// Replace the window overrides when the caller supplied either one.
    pub fn with_window_overrides(mut self, from: Option<String>, to: Option<String>) -> Self {
        if from.is_some() || to.is_some() {
            self.posted_from = from;
            self.posted_to = to;
        }
        self
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("api_key", &"<redacted>")
            .field("database_url", &redact_database_url(&self.database_url))
            .field("api_base_url", &self.api_base_url.as_str())
            .field("posted_from", &self.posted_from)
            .field("posted_to", &self.posted_to)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("redacted"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_fails_closed() {
        let err = IngestConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn blank_api_key_fails_closed() {
        let err = IngestConfig::from_lookup(lookup(&[("SAM_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn production_requires_database_url() {
        let err = IngestConfig::from_lookup(lookup(&[
            ("SAM_API_KEY", "key"),
            ("SAMLAND_ENV", "Production"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn development_falls_back_to_credential_free_database() {
        let config = IngestConfig::from_lookup(lookup(&[("SAM_API_KEY", "key")])).expect("config");
        assert_eq!(config.database_url, LOCAL_DATABASE_URL);
        assert!(Url::parse(LOCAL_DATABASE_URL).expect("url").password().is_none());
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
        assert_eq!(config.posted_from, None);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = IngestConfig::from_lookup(lookup(&[
            ("SAM_API_KEY", "key"),
            ("SAM_API_BASE_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("SAM_API_KEY", "super-secret-key"),
            ("DATABASE_URL", "postgres://loader:hunter2@db:5432/landing"),
        ]))
        .expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-key"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("loader"));
    }

    #[test]
    fn cli_overrides_replace_environment_window() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("SAM_API_KEY", "key"),
            ("POSTED_FROM", "01/01/2026"),
            ("POSTED_TO", "01/08/2026"),
        ]))
        .expect("config");

        let kept = config.clone().with_window_overrides(None, None);
        assert_eq!(kept.posted_from.as_deref(), Some("01/01/2026"));

        let replaced = config.with_window_overrides(Some("02/15/2026".into()), None);
        assert_eq!(replaced.posted_from.as_deref(), Some("02/15/2026"));
        assert_eq!(replaced.posted_to, None);
    }
}
