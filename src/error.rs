//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Input Errors**: malformed dates or symbols supplied by a caller
/// - **Upstream Errors**: HTTP failures or unexpected payloads from the
///   market data, listing or Telegram services
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Date is not a valid `YYMMDD` calendar date.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid date: {0} (expected YYMMDD)")]
    InvalidDate(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An outbound HTTP request failed (connect, timeout, non-2xx, decode).
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// An upstream service answered with something we could not interpret.
    #[error("Unexpected upstream response: {0}")]
    UpstreamResponse(String),

    /// The Telegram Bot API rejected a call (`ok: false`).
    #[error("Telegram API error {code}: {description}")]
    Telegram { code: i64, description: String },
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidDate`, `InvalidRequest` → 400 Bad Request
/// - `Upstream`, `UpstreamResponse`, `Telegram` → 502 Bad Gateway
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AppError::InvalidDate(_) => (StatusCode::BAD_REQUEST, "invalid_date"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Upstream(_) | AppError::UpstreamResponse(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            AppError::Telegram { .. } => (StatusCode::BAD_GATEWAY, "telegram_error"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        let cases = [
            (AppError::InvalidDate("2401".into()), StatusCode::BAD_REQUEST),
            (AppError::InvalidRequest("empty symbol".into()), StatusCode::BAD_REQUEST),
            (AppError::UpstreamResponse("no chart".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::Telegram {
                    code: 400,
                    description: "Bad Request: chat not found".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn invalid_date_message_names_expected_format() {
        let message = AppError::InvalidDate("20240101".into()).to_string();
        assert_eq!(message, "Invalid date: 20240101 (expected YYMMDD)");
    }
}
