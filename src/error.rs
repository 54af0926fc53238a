//! Error taxonomy for backend calls.
//!
//! ERROR HANDLING
//! ==============
//! - Validation errors are produced locally and never hit the network.
//! - `Unauthorized` is the terminal outcome of the 401 policy chain.
//! - Business-rule failures keep the backend's own message so callers can
//!   show it verbatim.
//! - Transport failures collapse to one generic user-facing message.
//!
//! Nothing here is retried automatically. `retryable` is advisory for
//! callers that choose to offer a manual retry.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use serde_json::Value;

/// Errors produced by gateway client and endpoint calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required input was missing or malformed; nothing was sent.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Authentication failed and could not be recovered by refresh.
    #[error("authentication required")]
    Unauthorized,

    /// The backend rejected the request.
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never completed (connect failure, timeout, reset).
    #[error("transport failed: {0}")]
    Transport(String),

    /// A success response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Stable machine-readable code for logs and UI mapping.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "E_VALIDATION",
            Self::Unauthorized => "E_UNAUTHORIZED",
            Self::Api { .. } => "E_API_RESPONSE",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Decode(_) => "E_DECODE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Api { status: 429 | 500..=599, .. })
    }

    /// Text suitable for a toast or inline form message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } | Self::Api { message, .. } => message.clone(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_owned(),
            Self::Transport(_) => "Unable to complete request. Check your connection and try again.".to_owned(),
            Self::Decode(_) | Self::HttpClientBuild(_) => "Unexpected response from server.".to_owned(),
        }
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }

    /// Build an `Api` error from a non-success status and its raw body.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| match body.trim() {
            "" => format!("HTTP {status}"),
            text => text.to_owned(),
        });
        Self::Api { status, message }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Pull a human-readable message out of a backend error body.
///
/// Recognizes `{"error": ...}`, `{"detail": ...}`, `{"message": ...}`,
/// `{"non_field_errors": [...]}`, field error maps (`{"email": ["..."]}`,
/// reported as `email: ...`) and bare string arrays.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return None,
    };
    match &value {
        Value::Object(fields) => {
            for key in ["error", "detail", "message", "non_field_errors"] {
                if let Some(text) = fields.get(key).and_then(first_text) {
                    return Some(text);
                }
            }
            fields
                .iter()
                .find_map(|(field, v)| first_text(v).map(|text| format!("{field}: {text}")))
        }
        other => first_text(other),
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}
