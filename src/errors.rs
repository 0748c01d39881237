use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::models::SourceKind;

/// Failure raised by a source adapter while talking to a vendor.
///
/// The variants keep "we could not reach the source" apart from "the source
/// answered and said no", which callers treat differently: transport failures
/// are retryable, business errors are shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The query or key was rejected locally before any call was made.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// Network failure, timeout, throttling, 5xx or an open circuit.
    #[error("{vendor} unavailable: {message}")]
    Transport { vendor: SourceKind, message: String },
    /// The vendor answered with an application-level error.
    #[error("{vendor} rejected the request: {message}")]
    Business { vendor: SourceKind, message: String },
    #[error("{vendor} has no record for {resource}")]
    NotFound { vendor: SourceKind, resource: String },
    /// The body could not be decoded as the expected shape.
    #[error("{vendor} returned a malformed payload: {message}")]
    MalformedPayload { vendor: SourceKind, message: String },
}

impl SourceError {
    /// True for failures worth retrying, and the only ones that trip the circuit breaker.
    pub fn is_transport(&self) -> bool {
        matches!(self, SourceError::Transport { .. })
    }

    pub fn transport(vendor: SourceKind, message: impl Into<String>) -> Self {
        SourceError::Transport {
            vendor,
            message: message.into(),
        }
    }

    pub fn business(vendor: SourceKind, message: impl Into<String>) -> Self {
        SourceError::Business {
            vendor,
            message: message.into(),
        }
    }

    pub fn malformed(vendor: SourceKind, message: impl Into<String>) -> Self {
        SourceError::MalformedPayload {
            vendor,
            message: message.into(),
        }
    }
}

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// A source could not be reached; the caller may retry.
    SourceUnavailable(String),
    /// A source refused the request; the message is the vendor's own.
    SourceRejected(String),
    /// A source answered with something we could not read.
    BadGateway(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::SourceUnavailable(msg) => write!(f, "Source unavailable: {}", msg),
            AppError::SourceRejected(msg) => write!(f, "Source rejected request: {}", msg),
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::SourceUnavailable(msg) => {
                tracing::warn!("Source unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": msg, "retryable": true }),
                )
            }
            AppError::SourceRejected(msg) => {
                tracing::info!("Source rejected request: {}", msg);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": msg, "retryable": false }),
                )
            }
            AppError::BadGateway(msg) => {
                tracing::error!("Malformed upstream payload: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "External service error" }),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.clone().into_response();
            }
        };

        (status, Json(body)).into_response()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::SourceUnavailable(msg) => AppError::SourceUnavailable(msg.clone()),
            AppError::SourceRejected(msg) => AppError::SourceRejected(msg.clone()),
            AppError::BadGateway(msg) => AppError::BadGateway(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<SourceError> for AppError {
    /// Business messages pass through untouched so the vendor's wording reaches the caller.
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidQuery(msg) => AppError::BadRequest(msg),
            SourceError::Transport { .. } => AppError::SourceUnavailable(err.to_string()),
            SourceError::Business { message, .. } => AppError::SourceRejected(message),
            SourceError::NotFound { .. } => AppError::NotFound(err.to_string()),
            SourceError::MalformedPayload { .. } => AppError::BadGateway(err.to_string()),
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, SourceError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: f(),
        })
    }
}
