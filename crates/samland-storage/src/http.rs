//! Single-attempt HTTP transport.

use anyhow::Context;
use async_trait::async_trait;
pub use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("reading body of http {status} response failed: {source}")]
    Body {
        status: StatusCode,
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Status line received before the failure, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(err) => err.status(),
            Self::Body { status, .. } => Some(*status),
        }
    }
}

/// The network capability the fetcher runs against.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue exactly one GET and read the full body as text, whatever the
    /// status class.
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().gzip(true).brotli(true);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| TransportError::Body { status, source })?;
        Ok(HttpResponse { status, body })
    }
}
