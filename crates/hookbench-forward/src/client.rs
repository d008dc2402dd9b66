//! HTTP client for forwarding callbacks with configurable timeouts.
//!
//! Handles request construction and error categorization. The response
//! status is the only thing the caller gets back; bodies are discarded.

use std::time::{Duration, Instant};

use hookbench_core::FormData;
use http::{
    header::{self, HeaderMap, HeaderName},
    Method,
};
use tracing::{debug, info_span, warn, Instrument};

use crate::{
    encode::encode_first_values,
    error::{ForwardError, Result},
    DEFAULT_TIMEOUT_SECONDS,
};

/// Configuration for outbound clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for a whole request, connect to last body byte.
    pub timeout: Duration,
    /// User agent sent when the caller did not send one.
    pub user_agent: String,
    /// Maximum number of redirects to follow. Zero disables following.
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            user_agent: concat!("hookbench/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 3,
        }
    }
}

impl ClientConfig {
    /// Builds the underlying reqwest client.
    pub(crate) fn build(&self) -> Result<reqwest::Client> {
        let redirect = if self.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(self.max_redirects)
        };

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .redirect(redirect)
            .build()
            .map_err(|e| ForwardError::configuration(format!("failed to build HTTP client: {e}")))
    }

    /// Maps a transport failure onto a `ForwardError`.
    pub(crate) fn classify(&self, err: &reqwest::Error) -> ForwardError {
        if err.is_timeout() {
            ForwardError::timeout(self.timeout.as_secs())
        } else if err.is_builder() {
            ForwardError::configuration(format!("invalid request: {err}"))
        } else if err.is_connect() {
            ForwardError::network(format!("connection failed: {err}"))
        } else {
            ForwardError::network(err.to_string())
        }
    }
}

/// Client that re-sends decoded forms to a destination.
#[derive(Debug, Clone)]
pub struct ForwardClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ForwardClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self { client: config.build()?, config })
    }

    /// Creates a client with default settings and the given timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::new(ClientConfig { timeout, ..ClientConfig::default() })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `form` to `destination` using the original request method.
    ///
    /// The body is re-encoded with only the first value per key. Forwarded
    /// headers are filtered by [`forwardable_headers`] and the content type
    /// is always set to form encoding. Any HTTP status counts as delivered.
    ///
    /// # Errors
    ///
    /// Returns `Timeout`, `Network` or `Configuration` when no response was
    /// received, and `Encoding` if the form cannot be encoded.
    pub async fn deliver(
        &self,
        method: &Method,
        headers: &HeaderMap,
        form: &FormData,
        destination: &str,
    ) -> Result<u16> {
        let span = info_span!("forward_delivery", method = %method, destination = %destination);

        async move {
            let body = encode_first_values(form)?;
            let start = Instant::now();

            let mut outbound = forwardable_headers(headers);
            outbound.remove(header::CONTENT_TYPE);

            let response = self
                .client
                .request(method.clone(), destination)
                .headers(outbound)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    let duration_ms = start.elapsed().as_millis();
                    warn!(duration_ms, "Forward request failed: {}", e);
                    self.config.classify(&e)
                })?;

            let status = response.status().as_u16();
            debug!(status, duration_ms = start.elapsed().as_millis(), "Forward response received");
            Ok(status)
        }
        .instrument(span)
        .await
    }
}

/// Copies `headers`, dropping the ones the outbound client manages itself.
///
/// `Host`, `Content-Length` and the hop-by-hop headers are removed. Everything
/// else, including the caller's `User-Agent`, passes through unchanged.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_managed_header(name) {
            outbound.append(name.clone(), value.clone());
        }
    }
    outbound
}

fn is_managed_header(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "content-length"
            | "host"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
