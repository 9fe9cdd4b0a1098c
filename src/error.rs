use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the frontdesk-connect service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // ── Request Errors ──────────────────────────────────────────────────
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid state parameter")]
    InvalidState,

    // ── Upstream Errors ─────────────────────────────────────────────────
    #[error("Facebook Graph API error: {0}")]
    Graph(String),

    #[error("Automation webhook error: {0}")]
    Forward(String),

    #[error("Retell error: {0}")]
    Retell(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("{0} is unavailable")]
    Unavailable(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state"),
            ApiError::Graph(_) => (StatusCode::BAD_GATEWAY, "graph_error"),
            ApiError::Forward(_) => (StatusCode::BAD_GATEWAY, "forward_error"),
            ApiError::Retell(_) => (StatusCode::BAD_GATEWAY, "retell_error"),
            ApiError::NotConfigured(_) => (StatusCode::INTERNAL_SERVER_ERROR, "not_configured"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            ApiError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        ApiError::Database(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, "{self}");
        } else {
            tracing::debug!(code, "{self}");
        }

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
