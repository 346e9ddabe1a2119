//! HTTP error types.

use thiserror::Error;

/// Errors that can occur while talking to the REST API.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request failed before a response arrived.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Unauthorized (invalid token).
    #[error("unauthorized: invalid token")]
    Unauthorized,

    /// The API answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, usually a JSON error document.
        body: String,
    },

    /// A configured header value could not be encoded.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}
