//! Custom error types for the common library
//!
//! This module defines the errors raised while talking to the remote photo
//! library. They are shared by every service that consumes a `MediaSource`.

use thiserror::Error;

/// Custom error type for remote photo library operations
#[derive(Error, Debug)]
pub enum PhotosError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote service answered with a non-success status
    #[error("Unexpected status {status} from {endpoint}")]
    Status { endpoint: &'static str, status: u16 },

    /// The response body could not be decoded
    #[error("Failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Access token could not be obtained
    #[error("Authorization error: {0}")]
    Auth(String),

    /// The request was rejected before being sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Type alias for Result with PhotosError
pub type PhotosResult<T> = Result<T, PhotosError>;
