//! hookbench HTTP API.
//!
//! Serves the callback endpoint, the log listings, the test page and a
//! health probe. All shared dependencies travel in [`AppState`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::{Context, Result};
use hookbench_core::{AccessFilter, Clock, LogStore};
use hookbench_forward::{ForwardClient, Forwarder, RedirectProxy};
use tokio::task::JoinHandle;

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use config::{Config, GetResponse, LogStoreKind, ResponseFormat};
pub use server::{create_router, serve, start_server};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Immutable service configuration.
    pub config: Arc<Config>,
    /// Callback log.
    pub store: Arc<dyn LogStore>,
    /// Source address gate.
    pub access: Arc<AccessFilter>,
    /// Background forwarder, when a forward URL is configured.
    pub forwarder: Option<Forwarder>,
    /// Relay for non-local callers, when redirecting is enabled.
    pub redirect: Option<RedirectProxy>,
    /// Time source for health timestamps.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Builds state without a forwarder.
    ///
    /// # Errors
    ///
    /// Returns an error if the redirect client cannot be built.
    pub fn new(config: Config, store: Arc<dyn LogStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let redirect = config
            .redirect_target()
            .map(|target| RedirectProxy::new(target, config.to_client_config().timeout))
            .transpose()
            .context("failed to build redirect client")?;

        Ok(Self {
            access: Arc::new(config.access_filter()),
            config: Arc::new(config),
            store,
            forwarder: None,
            redirect,
            clock,
        })
    }

    /// Attaches a forwarder.
    pub fn with_forwarder(mut self, forwarder: Forwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Builds state and starts the forwarder if a forward URL is set.
    ///
    /// Returns the forwarder's worker handle alongside the state. Must be
    /// called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound HTTP client cannot be built.
    pub fn start(
        config: Config,
        store: Arc<dyn LogStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, Option<JoinHandle<()>>)> {
        let state = Self::new(config, store, clock)?;

        let Some(destination) = state.config.forward_url().map(str::to_string) else {
            return Ok((state, None));
        };

        let client = ForwardClient::new(state.config.to_client_config())
            .context("failed to build forwarding client")?;
        let (forwarder, worker) = Forwarder::spawn(client, state.store.clone(), destination);

        Ok((state.with_forwarder(forwarder), Some(worker)))
    }
}
