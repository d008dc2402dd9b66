//! Standard JSON error bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hookbench_core::HookError;
use serde::Serialize;

/// Error body returned by the JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Machine-readable code plus message.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code from the `HookError` taxonomy.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Status code a `HookError` maps to.
pub fn status_for(error: &HookError) -> StatusCode {
    match error {
        HookError::InvalidBody { .. } | HookError::UnsupportedContentType { .. } => {
            StatusCode::BAD_REQUEST
        },
        HookError::Forbidden { .. } => StatusCode::FORBIDDEN,
        HookError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        HookError::Storage(_) | HookError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Renders `error` as a JSON error body.
pub fn create_error_response(status: StatusCode, error: &HookError) -> Response {
    let error_response = ErrorResponse {
        error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
    };

    (status, Json(error_response)).into_response()
}

#[cfg(test)]
mod tests {
    use hookbench_core::CoreError;

    use super::*;

    #[test]
    fn error_response_includes_code() {
        let error = HookError::Storage(CoreError::Database("disk I/O error".into()));
        let body = serde_json::to_value(ErrorResponse {
            error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
        })
        .unwrap();

        assert_eq!(body["error"]["code"], "E3001");
        assert!(body["error"]["message"].as_str().unwrap().contains("disk I/O error"));
    }

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(status_for(&HookError::invalid_body("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&HookError::UpstreamUnavailable { message: "refused".into() }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&HookError::Storage(CoreError::Database("gone".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
