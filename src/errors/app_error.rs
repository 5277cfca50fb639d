use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error codes for structured error responses
pub mod error_codes {
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const BAD_REQUEST: &str = "bad_request";
    pub const CONFIG_ERROR: &str = "config_error";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
}

/// Application error type for the HTTP surface
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Unexpected server-side failure
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Client sent an invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Required configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream realtime API returned an error response
    #[error("Upstream error ({0}): {1}")]
    Upstream(StatusCode, String),

    /// The upstream realtime API was unreachable
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),
}

impl AppError {
    /// Get the error code for structured error responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => error_codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => error_codes::BAD_REQUEST,
            AppError::Config(_) => error_codes::CONFIG_ERROR,
            AppError::Upstream(_, _) => error_codes::UPSTREAM_ERROR,
            AppError::UpstreamUnavailable(_) => error_codes::UPSTREAM_UNAVAILABLE,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // Client errors from upstream (e.g. a rejected API key) surface
            // as-is so the operator sees the real status; server errors map
            // to 502 because the fault is on the far side of this gateway.
            AppError::Upstream(status, _) => {
                if status.is_client_error() {
                    *status
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Log the error at the appropriate level
    pub fn log(&self) {
        match self {
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
            }
            AppError::Upstream(status, msg) => {
                tracing::warn!("Upstream error ({}): {}", status, msg);
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal server error: {}", msg);
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
            }
            AppError::UpstreamUnavailable(err) => {
                tracing::error!("Upstream unavailable: {}", err);
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let error_code = self.error_code();
        let error_message = self.to_string();

        let body = Json(json!({
            "error": error_code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
