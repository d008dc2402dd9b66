//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response tracing
//! 3. Timeout enforcement (`request_timeout`)
//! 4. Access gate
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! On SIGTERM or CTRL+C the server stops accepting connections and waits
//! for in-flight requests before returning.

use std::{future::Future, net::SocketAddr};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{handlers, middleware::access_gate, AppState};

/// Creates the Axum router with all routes and middleware.
///
/// Callback routes are mounted under `config.base_path`; `/health` sits at
/// the root. The access gate covers every route.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use hookbench_api::{create_router, AppState, Config};
/// use hookbench_core::{MemoryLogStore, RealClock};
///
/// let state =
///     AppState::new(Config::default(), Arc::new(MemoryLogStore::new()), Arc::new(RealClock))
///         .unwrap();
/// let app = create_router(state);
/// ```
pub fn create_router(state: AppState) -> Router {
    let base = state.config.base_path.clone();

    let callback_routes = Router::new()
        .route(&base, get(handlers::callback).post(handlers::callback))
        .route(&format!("{base}/logs"), get(handlers::list_logs))
        .route(&format!("{base}/logs/full"), get(handlers::list_logs))
        .route(&format!("{base}/logs/recent"), get(handlers::list_recent_logs))
        .route(&format!("{base}/logs/clear"), delete(handlers::clear_logs))
        .route(&format!("{base}/page"), get(handlers::test_page));

    let health_routes = Router::new().route("/health", get(handlers::health_check));

    Router::new()
        .merge(callback_routes)
        .merge(health_routes)
        .layer(middleware::from_fn_with_state(state.clone(), access_gate))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Serves `state` on an already bound listener until `shutdown` resolves.
///
/// Peer addresses are captured so the access gate can see them.
///
/// # Errors
///
/// Returns `std::io::Error` if the listener fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Binds to `addr` and serves requests until a shutdown signal is received.
///
/// # Errors
///
/// Returns `std::io::Error` if the port is already in use or the network
/// interface is unavailable.
pub async fn start_server(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
