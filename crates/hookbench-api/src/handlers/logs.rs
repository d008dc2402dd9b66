//! Log listing and clearing.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hookbench_core::{storage::RECENT_LIMIT, HookError};
use serde_json::json;
use tracing::{error, info, instrument};

use super::error::create_error_response;
use crate::AppState;

/// Returns every logged callback, newest first.
#[instrument(name = "list_logs", skip(state))]
pub async fn list_logs(State(state): State<AppState>) -> Response {
    match state.store.list_all().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => storage_failure(e.into()),
    }
}

/// Returns the most recent callbacks, newest first.
#[instrument(name = "list_recent_logs", skip(state))]
pub async fn list_recent_logs(State(state): State<AppState>) -> Response {
    match state.store.list_recent(RECENT_LIMIT).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => storage_failure(e.into()),
    }
}

/// Deletes every logged callback.
#[instrument(name = "clear_logs", skip(state))]
pub async fn clear_logs(State(state): State<AppState>) -> Response {
    match state.store.clear_all().await {
        Ok(removed) => {
            info!(removed, "Logs cleared");
            Json(json!({ "message": "Logs cleared successfully" })).into_response()
        },
        Err(e) => storage_failure(e.into()),
    }
}

fn storage_failure(err: HookError) -> Response {
    error!("Log store request failed: {}", err);
    create_error_response(StatusCode::INTERNAL_SERVER_ERROR, &err)
}
