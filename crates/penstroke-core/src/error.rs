use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced to callers of the request executor and the API client.
///
/// Session expiry is not represented here: it arrives as
/// [`Outcome::Redirected`](crate::api::Outcome) so it cannot be swallowed by
/// a generic error handler.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unable to reach server: {0}")]
    NetworkFailure(#[from] TransportError),

    #[error("{message}")]
    RequestFailed { status: StatusCode, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request: {0}")]
    Encode(serde_json::Error),

    #[error("No pending sign-up - please sign up again")]
    NoPendingSignup,

    #[error("Not signed in")]
    NotSignedIn,
}

impl ApiError {
    /// Build a `RequestFailed` from a parsed response body, preferring the
    /// server's `message` field.
    pub fn from_body(status: StatusCode, body: &serde_json::Value) -> Self {
        let message = match body.get("message") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Null) | Some(serde_json::Value::String(_)) | None => {
                format!("Request failed with status {}", status.as_u16())
            }
            Some(other) => other.to_string(),
        };
        ApiError::RequestFailed { status, message }
    }

    /// True when no response was obtained at all.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::NetworkFailure(_))
    }
}

/// Failure to obtain any HTTP response.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Classify a reqwest failure. `timeout` is the limit the client was built with.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Errors reading persisted session state.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Stored session is corrupted: {0}")]
    CorruptedLocalState(#[from] serde_json::Error),
}
