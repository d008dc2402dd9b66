//! Synchronous redirect relaying.
//!
//! Unlike forwarding, relaying happens inside the request: the caller waits
//! for the upstream answer and receives it verbatim. Redirects returned by
//! the upstream are passed back rather than followed.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{debug, info_span, warn, Instrument};

use crate::{
    client::{forwardable_headers, ClientConfig},
    error::Result,
};

/// Upstream response relayed back to the caller.
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    /// Upstream status code.
    pub status: StatusCode,
    /// Upstream content type, if any.
    pub content_type: Option<HeaderValue>,
    /// Upstream body.
    pub body: Bytes,
}

/// Relays whole requests to a fixed URL.
#[derive(Debug, Clone)]
pub struct RedirectProxy {
    client: reqwest::Client,
    config: ClientConfig,
    target: String,
}

impl RedirectProxy {
    /// Creates a proxy for `target`.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(target: impl Into<String>, timeout: Duration) -> Result<Self> {
        let config = ClientConfig { timeout, max_redirects: 0, ..ClientConfig::default() };
        Ok(Self { client: config.build()?, config, target: target.into() })
    }

    /// URL requests are relayed to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Sends `method`, `headers` and `body` to the target and returns the
    /// upstream answer.
    ///
    /// # Errors
    ///
    /// Returns a `ForwardError` if the upstream could not be reached or its
    /// body could not be read.
    pub async fn relay(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<RelayedResponse> {
        let span = info_span!("redirect_relay", method = %method, target = %self.target);

        async move {
            let start = Instant::now();

            let response = self
                .client
                .request(method, &self.target)
                .headers(forwardable_headers(headers))
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    warn!("Relay request failed: {}", e);
                    self.config.classify(&e)
                })?;

            let status = response.status();
            let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
            let body = response.bytes().await.map_err(|e| self.config.classify(&e))?;

            debug!(
                status = status.as_u16(),
                bytes = body.len(),
                duration_ms = start.elapsed().as_millis(),
                "Relay response received"
            );

            Ok(RelayedResponse { status, content_type, body })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::ForwardError;

    #[tokio::test]
    async fn relays_status_body_and_content_type() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("PUT"))
            .and(matchers::body_string("raw=body"))
            .and(matchers::header("x-caller", "abc"))
            .and(matchers::header("user-agent", "curl/8.5.0"))
            .respond_with(
                ResponseTemplate::new(418).set_body_raw("short and stout", "text/teapot"),
            )
            .mount(&mock_server)
            .await;

        let proxy = RedirectProxy::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-caller", HeaderValue::from_static("abc"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.5.0"));
        headers.insert(header::HOST, HeaderValue::from_static("public.example"));

        let relayed =
            proxy.relay(Method::PUT, &headers, Bytes::from_static(b"raw=body")).await.unwrap();

        assert_eq!(relayed.status, StatusCode::IM_A_TEAPOT);
        assert_eq!(relayed.content_type.unwrap(), "text/teapot");
        assert_eq!(relayed.body, Bytes::from_static(b"short and stout"));
    }

    #[tokio::test]
    async fn upstream_redirects_are_not_followed() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::any())
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .mount(&mock_server)
            .await;

        let proxy = RedirectProxy::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        let relayed = proxy.relay(Method::GET, &HeaderMap::new(), Bytes::new()).await.unwrap();

        assert_eq!(relayed.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error() {
        let proxy = RedirectProxy::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        let err = proxy.relay(Method::GET, &HeaderMap::new(), Bytes::new()).await.unwrap_err();

        assert!(matches!(err, ForwardError::Network { .. } | ForwardError::Timeout { .. }));
    }
}
