//! HTTP transport seam for OAuth requests.
//!
//! The strategy never talks to an HTTP client directly. Requests are described
//! as plain data and executed by an [`OAuthTransport`]; non-2xx responses come
//! back as [`TransportError::Status`] so callers see one error channel.

use async_trait::async_trait;
use std::error::Error as StdError;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Outbound request. Every OAuth call made here is a POST.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn post(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] Box<dyn StdError + Send + Sync>),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(Box::new(err))
    }
}

/// Executes OAuth HTTP requests.
#[async_trait]
pub trait OAuthTransport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`OAuthTransport`] backed by a shared `reqwest::Client`.
///
/// Timeouts and proxies are whatever the supplied client was built with.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OAuthTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.post(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let res = builder.send().await?;
        let status = res.status();
        let body = res.text().await?;

        debug!(
            host = request.url.host_str().unwrap_or_default(),
            path = request.url.path(),
            status = status.as_u16(),
            "OAuth request completed"
        );

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}
