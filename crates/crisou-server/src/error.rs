//! Error types for the Crisou API server.
//!
//! [`ApiError`] wraps every failure a handler can produce and converts it
//! into an HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. The body
//! always has the same shape so the frontend can branch on `kind` and
//! `retryable` without parsing messages:
//!
//! ```json
//! {"error": "...", "kind": "generation_failure", "status": 502, "retryable": true}
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use crisou_engine::EngineError;
use tracing::{error, warn};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A session id in the request path is not a UUID.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Engine(e) => match e {
                EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                EngineError::Terminated { .. } | EngineError::InvalidState(_) => {
                    StatusCode::CONFLICT
                }
                EngineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
                EngineError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
                EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Engine(e) => match e {
                EngineError::Validation(_) => "validation",
                EngineError::Terminated { .. } => "terminated",
                EngineError::InvalidState(_) => "invalid_state",
                EngineError::SessionNotFound(_) => "session_not_found",
                EngineError::GenerationFailure(_) => "generation_failure",
                EngineError::Persistence(_) => "persistence",
                EngineError::Config(_) => "config",
            },
            Self::InvalidSessionId(_) => "validation",
        }
    }

    /// Whether the client may resend the same request unchanged.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Engine(e) => e.is_retryable(),
            Self::InvalidSessionId(_) => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        });

        (status, axum::Json(body)).into_response()
    }
}
