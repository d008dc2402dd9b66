//! Source address allow-list middleware.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hookbench_core::HookError;
use tracing::warn;

use crate::AppState;

/// Address of the peer that sent the request, if known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientAddr(pub Option<IpAddr>);

impl ClientAddr {
    /// Whether the peer is on the local machine.
    ///
    /// An unknown peer is not local.
    pub fn is_loopback(&self) -> bool {
        self.0.is_some_and(|ip| match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(v6.is_loopback(), |v4| v4.is_loopback()),
            IpAddr::V4(v4) => v4.is_loopback(),
        })
    }

    /// Address as text, or empty when unknown.
    pub fn as_text(&self) -> String {
        self.0.map(|ip| ip.to_string()).unwrap_or_default()
    }
}

/// Rejects callers missing from the allow-list and records the caller's
/// address for downstream handlers.
///
/// Denied requests get `403` with a plain `Forbidden` body and never reach a
/// handler, so nothing is logged for them.
pub async fn access_gate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let client = ClientAddr(
        req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip()),
    );

    let allowed = match client.0 {
        Some(ip) => state.access.is_allowed_ip(ip),
        None => state.access.is_allowed(""),
    };

    if !allowed {
        let err = HookError::Forbidden { address: client.as_text() };
        warn!(path = %req.uri().path(), "{}", err);
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    req.extensions_mut().insert(client);
    next.run(req).await
}
