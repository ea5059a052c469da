//! Error types for the HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use pulse_analytics::AnalyticsError;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum WebError {
    /// Analytics or store failure.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// The request was malformed or failed validation.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebError::Analytics(AnalyticsError::StoreUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            WebError::Analytics(AnalyticsError::InvalidRecord(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            WebError::Analytics(AnalyticsError::StoreUnavailable(_)) => "STORE_UNAVAILABLE",
            WebError::Analytics(AnalyticsError::InvalidRecord(_)) => "INVALID_RECORD",
            WebError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for WebError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        WebError::BadRequest(err.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for WebError {
    fn from(err: axum::extract::rejection::QueryRejection) -> Self {
        WebError::BadRequest(err.body_text())
    }
}
