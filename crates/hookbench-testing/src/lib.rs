//! Test infrastructure for hookbench.
//!
//! `TestEnv` wires a router over an in-memory log store (or in-memory
//! SQLite) with a deterministic clock, and drives it with
//! `tower::ServiceExt::oneshot`. Requests carry a peer address so the
//! access gate and redirect logic see a real caller.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use axum::{
    body::{self, Body},
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use hookbench_api::{create_router, AppState, Config, GetResponse, ResponseFormat};
use hookbench_core::{storage, LogId, LogRecord, LogStore, MemoryLogStore, SqliteLogStore};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

pub use hookbench_core::TestClock;

/// Loopback caller address.
pub const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Non-local caller address (TEST-NET-3).
pub const REMOTE: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10));

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Log store backing a test environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `MemoryLogStore`.
    Memory,
    /// `SqliteLogStore` over a private in-memory database.
    Sqlite,
}

/// Builder for configuring a `TestEnv`.
#[derive(Debug)]
pub struct TestEnvBuilder {
    config: Config,
    backend: Backend,
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self { config: Config::default(), backend: Backend::Memory }
    }
}

impl TestEnvBuilder {
    /// Creates a builder with default configuration over the memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the log store backend.
    #[must_use]
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Mounts the callback routes under `path`.
    #[must_use]
    pub fn base_path(mut self, path: &str) -> Self {
        self.config.base_path = path.to_string();
        self
    }

    /// Sets the GET answer mode.
    #[must_use]
    pub fn get_response(mut self, mode: GetResponse) -> Self {
        self.config.get_response = mode;
        self
    }

    /// Sets the POST answer format.
    #[must_use]
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.config.response_format = format;
        self
    }

    /// Enables the access gate with the given allow-list.
    #[must_use]
    pub fn allow_only<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ip_protection_enabled = true;
        self.config.allowed_ips = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Forwards POSTs to `url`.
    #[must_use]
    pub fn forward_to(mut self, url: impl Into<String>) -> Self {
        self.config.forward_url = Some(url.into());
        self
    }

    /// Relays non-local callers to `url`.
    #[must_use]
    pub fn redirect_to(mut self, url: impl Into<String>) -> Self {
        self.config.redirect_enabled = true;
        self.config.redirect_url = Some(url.into());
        self
    }

    /// Sets outbound request timeouts.
    #[must_use]
    pub fn outbound_timeout(mut self, timeout: Duration) -> Self {
        self.config.forward_timeout_seconds = timeout.as_secs().max(1);
        self
    }

    /// Builds the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be opened.
    pub async fn build(self) -> Result<TestEnv> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
            )
            .with_test_writer()
            .try_init();

        self.config.validate().context("invalid test configuration")?;

        let clock = TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(1_733_788_800));
        let store: Arc<dyn LogStore> = match self.backend {
            Backend::Memory => Arc::new(MemoryLogStore::with_clock(Arc::new(clock.clone()))),
            Backend::Sqlite => {
                let pool = storage::connect_in_memory().await?;
                storage::migrate(&pool).await?;
                Arc::new(SqliteLogStore::with_clock(pool, Arc::new(clock.clone())))
            },
        };

        let (state, forward_worker) =
            AppState::start(self.config, store.clone(), Arc::new(clock.clone()))?;
        let router = create_router(state.clone());

        Ok(TestEnv { clock, store, state, router, forward_worker })
    }
}

/// Test environment around one router instance.
pub struct TestEnv {
    /// Deterministic clock shared with the store
    pub clock: TestClock,
    /// Log store behind the router
    pub store: Arc<dyn LogStore>,
    /// State the router was built from
    pub state: AppState,
    router: Router,
    forward_worker: Option<JoinHandle<()>>,
}

impl TestEnv {
    /// Creates an environment with default configuration.
    pub async fn new() -> Result<Self> {
        TestEnvBuilder::new().build().await
    }

    /// Starts configuring an environment.
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::new()
    }

    /// Path the callback endpoint is mounted on.
    pub fn base_path(&self) -> &str {
        &self.state.config.base_path
    }

    /// Joins `suffix` onto the base path.
    pub fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.base_path())
    }

    /// Sends a prepared request through the router.
    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = body::to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .context("failed to read response body")?;
        Ok(TestResponse { status, headers, body })
    }

    /// Sends `method` to `uri` from `from` with an empty body.
    pub async fn request(&self, method: Method, uri: &str, from: IpAddr) -> Result<TestResponse> {
        self.send(request_from(method, uri, from).body(Body::empty())?).await
    }

    /// GETs `uri` as `from`.
    pub async fn get(&self, uri: &str, from: IpAddr) -> Result<TestResponse> {
        self.request(Method::GET, uri, from).await
    }

    /// POSTs a form-encoded body to the callback path as `from`.
    pub async fn post_form(&self, body: &str, from: IpAddr) -> Result<TestResponse> {
        self.post(
            self.base_path(),
            "application/x-www-form-urlencoded",
            body.as_bytes().to_vec(),
            from,
        )
        .await
    }

    /// POSTs `body` with `content_type` to `uri` as `from`.
    pub async fn post(
        &self,
        uri: &str,
        content_type: &str,
        body: impl Into<Body>,
        from: IpAddr,
    ) -> Result<TestResponse> {
        let request = request_from(Method::POST, uri, from)
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())?;
        self.send(request).await
    }

    /// Every logged record, newest first.
    pub async fn records(&self) -> Result<Vec<LogRecord>> {
        Ok(self.store.list_all().await?)
    }

    /// Polls until record `id` carries a forwarding outcome.
    ///
    /// # Errors
    ///
    /// Fails if the outcome does not appear within `timeout`.
    pub async fn wait_for_outcome(&self, id: LogId, timeout: Duration) -> Result<LogRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let records = self.records().await?;
            if let Some(record) = records.into_iter().find(|r| r.id == id) {
                if record.body.as_deref().is_some_and(has_outcome) {
                    return Ok(record);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("record {id} has no forwarding outcome after {timeout:?}");
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Drops the router and waits for queued forwards to finish.
    pub async fn shutdown(self) -> Result<()> {
        let Self { state, router, forward_worker, .. } = self;
        drop(router);
        drop(state);
        if let Some(worker) = forward_worker {
            tokio::time::timeout(Duration::from_secs(10), worker)
                .await
                .context("forwarder did not drain")??;
        }
        Ok(())
    }
}

fn has_outcome(body: &str) -> bool {
    body.lines()
        .any(|line| line.starts_with("forward_status=") || line.starts_with("forward_error="))
}

/// Starts a request builder carrying `from` as the peer address.
pub fn request_from(method: Method, uri: &str, from: IpAddr) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::new(from, 40_000)))
}

/// Starts a mock destination answering every request with `status`.
pub async fn mock_destination(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(matchers::any()).respond_with(ResponseTemplate::new(status)).mount(&server).await;
    server
}

/// Response captured from the router.
#[derive(Debug, Clone)]
pub struct TestResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Full body
    pub body: Bytes,
}

impl TestResponse {
    /// Body as UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.body).context("response body is not JSON")
    }

    /// Content type header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}
