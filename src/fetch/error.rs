//! Error types for the fetch layer.

use thiserror::Error;

/// A failed page request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Response body returned alongside the failure, when there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            FetchError::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// A creation timestamp that could not be interpreted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("unrecognised date format: {0:?}")]
    Format(String),
    #[error("epoch value out of range: {0}")]
    OutOfRange(String),
    #[error("unsupported value type: {0}")]
    Type(&'static str),
}
