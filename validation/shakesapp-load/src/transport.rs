//! HTTP transport used by virtual users.

use crate::config::TestConfig;
use crate::error::RequestFailure;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use std::sync::Arc;
use url::Url;

/// What the load generator keeps from a completed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub bytes: usize,
}

/// Issues a single GET. Non-2xx statuses are failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Response, RequestFailure>;
}

/// Builds one transport per virtual user.
///
/// An error here is a startup failure for that user only.
pub trait TransportFactory: Send + Sync {
    fn create(&self, user_id: usize) -> anyhow::Result<Arc<dyn Transport>>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a client honoring the configured timeout and reuse policy.
    ///
    /// With reuse disabled no idle connection is kept and every request asks
    /// the server to close, so each GET dials a fresh connection.
    pub fn new(config: &TestConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());

        if config.reuse_connections {
            builder = builder.pool_max_idle_per_host(1);
        } else {
            let mut headers = HeaderMap::new();
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
            builder = builder.pool_max_idle_per_host(0).default_headers(headers);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Response, RequestFailure> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        // Drain the body so a pooled connection can be reused. A body cut
        // short by a reset or timeout fails the request.
        let bytes = response.bytes().await?.len();

        if !status.is_success() {
            return Err(RequestFailure::Status(status.as_u16()));
        }
        Ok(Response {
            status: status.as_u16(),
            bytes,
        })
    }
}

/// Default factory: a fresh [`HttpTransport`] per user.
pub struct HttpTransportFactory {
    config: TestConfig,
}

impl HttpTransportFactory {
    pub fn new(config: TestConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self, _user_id: usize) -> anyhow::Result<Arc<dyn Transport>> {
        Ok(Arc::new(HttpTransport::new(&self.config)?))
    }
}
