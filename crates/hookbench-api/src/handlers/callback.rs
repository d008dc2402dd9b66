//! The callback endpoint.
//!
//! Flow per request, after the access gate has admitted it:
//! 1. Relay to the redirect target instead, if one is set and the caller is
//!    not local
//! 2. Decode the body (POST only), rejecting undecodable bodies with 400
//! 3. Append the request to the log
//! 4. Answer according to `get_response` / `response_format`
//! 5. Queue the decoded form for forwarding, if configured
//!
//! Storage and forwarding failures are logged and never change the answer.

use axum::{
    extract::{Extension, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use hookbench_core::{CallbackMethod, FormData, HookError, LogId};
use hookbench_forward::{forwardable_headers, ForwardJob, RedirectProxy};
use serde_json::json;
use tracing::{debug, error, instrument, warn};

use super::error::status_for;
use crate::{config::GetResponse, middleware::ClientAddr, AppState, ResponseFormat};

/// Body of the 405 answer to GET.
pub const GET_REJECTED: &str = "GET request not processed";

/// Handles GET and POST on the callback path.
#[instrument(name = "callback", skip_all, fields(method = %method, client = %client.as_text()))]
pub async fn callback(
    State(state): State<AppState>,
    Extension(client): Extension<ClientAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(proxy) = &state.redirect {
        if !client.is_loopback() {
            return relay(proxy, method, &headers, body).await;
        }
    }

    match method {
        Method::POST => handle_post(&state, method, headers, &body).await,
        Method::GET => handle_get(&state).await,
        // HEAD is routed along with GET but is never logged.
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn handle_get(state: &AppState) -> Response {
    record(state, CallbackMethod::Get, None).await;

    match state.config.get_response {
        GetResponse::Reject => (StatusCode::METHOD_NOT_ALLOWED, GET_REJECTED).into_response(),
        GetResponse::Ack => Json(json!({ "message": "GET request success" })).into_response(),
    }
}

async fn handle_post(
    state: &AppState,
    method: Method,
    headers: HeaderMap,
    body: &[u8],
) -> Response {
    let form = match decode_form(&headers, body) {
        Ok(form) => form,
        Err(e) => {
            warn!(code = e.code(), "Rejected callback body: {}", e);
            return (status_for(&e), e.to_string()).into_response();
        },
    };

    debug!(fields = form.len(), "Callback body decoded");
    let log_id = record(state, CallbackMethod::Post, Some(form.to_log_text())).await;

    let response = match state.config.response_format {
        ResponseFormat::Plain => {
            let forward_url = state.config.forward_url().unwrap_or_default();
            render_plain(&form, forward_url).into_response()
        },
        ResponseFormat::Json => {
            Json(json!({ "received_data": form.first_value_view() })).into_response()
        },
    };

    if let (Some(forwarder), Some(log_id)) = (&state.forwarder, log_id) {
        let headers = forwardable_headers(&headers);
        forwarder.schedule(ForwardJob { log_id, method, headers, form });
    }

    response
}

/// Appends to the log, reporting failures only through tracing.
async fn record(state: &AppState, method: CallbackMethod, body: Option<String>) -> Option<LogId> {
    match state.store.append(method, body).await {
        Ok(id) => {
            debug!(log_id = %id, "Callback logged");
            Some(id)
        },
        Err(e) => {
            error!(error = %e, "Failed to log callback");
            None
        },
    }
}

async fn relay(
    proxy: &RedirectProxy,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    match proxy.relay(method, headers, body).await {
        Ok(relayed) => {
            let mut response = (relayed.status, relayed.body).into_response();
            match relayed.content_type {
                Some(content_type) => {
                    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
                },
                None => {
                    response.headers_mut().remove(header::CONTENT_TYPE);
                },
            }
            response
        },
        Err(e) => {
            let err = HookError::UpstreamUnavailable { message: e.to_string() };
            error!(target_url = %proxy.target(), "{}", err);
            (status_for(&err), err.to_string()).into_response()
        },
    }
}

/// Decodes a POST body according to its content type.
///
/// A missing content type is treated as form encoding.
pub fn decode_form(headers: &HeaderMap, body: &[u8]) -> Result<FormData, HookError> {
    let content_type = match headers.get(header::CONTENT_TYPE) {
        None => None,
        Some(value) => {
            let value = value.to_str().map_err(|_| HookError::UnsupportedContentType {
                content_type: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })?;
            let essence = value.split(';').next().unwrap_or_default().trim();
            Some(essence.to_ascii_lowercase())
        },
    };

    match content_type.as_deref() {
        None | Some("" | "application/x-www-form-urlencoded") => FormData::parse_urlencoded(body),
        Some("application/json") => FormData::parse_json(body),
        Some(other) => Err(HookError::UnsupportedContentType { content_type: other.to_string() }),
    }
}

/// Renders the plain-text acknowledgment: one `key=value` line per field,
/// first values only, then the fixed `Response.*` trailer.
///
/// Keys and values are written as submitted. A newline inside one shows up
/// as an extra line ahead of the trailer.
pub fn render_plain(form: &FormData, forward_url: &str) -> String {
    let mut lines: Vec<String> = form.first_values().map(|(k, v)| format!("{k}={v}")).collect();
    lines.push("Response.action=approve".to_string());
    lines.push("Response.reason=ok".to_string());
    lines.push(format!("Response.forwardUrl={forward_url}"));
    lines.join("\n")
}
