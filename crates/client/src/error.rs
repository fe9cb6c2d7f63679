//! Backend error taxonomy.
//!
//! Every backend call returns [`ApiError`]. The wizard and cart manager turn
//! errors into notifications with [`ApiError::user_message`], which picks the
//! most specific message the backend sent.

use serde_json::Value;
use thiserror::Error;

/// Message shown when nothing more specific is available.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors that can occur when talking to the SecondHand backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("API error: {status}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, parsed as JSON when possible, otherwise a string.
        body: Value,
    },

    /// Missing or expired credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request could not be built (bad URL, bad header value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for backend calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Build an error from a status code and raw response text.
    #[must_use]
    pub fn from_response(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self::Api { status, body }
    }

    /// Most specific human-readable message for this error.
    ///
    /// Fallback chain: `body.message`, then `body.error`, then the body
    /// itself. A backend answer with a blank or `{}` body gets a generic
    /// message; errors without a response use their display text.
    #[must_use]
    pub fn user_message(&self) -> String {
        let Self::Api { body, .. } = self else {
            return self.to_string();
        };

        if let Some(message) = non_empty_str(body.get("message")) {
            return message;
        }
        if let Some(error) = non_empty_str(body.get("error")) {
            return error;
        }
        match body {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::Null | Value::String(_) => GENERIC_ERROR_MESSAGE.to_string(),
            Value::Object(map) if map.is_empty() => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// HTTP status, if the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Unauthorized => Some(401),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
