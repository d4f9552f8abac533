//! Error types for the feeder service

use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::PhotosError;
use serde_json::json;
use thiserror::Error;

/// Errors returned by the metadata cache to its readers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The store is still empty
    #[error("Metadata hasn't been downloaded yet")]
    NotReady,
}

/// Failure reading or writing the identifier snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot path {0} is not a regular file")]
    InvalidPath(PathBuf),
}

/// A metadata refresh attempt that was abandoned
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Listing failed on page {page}: {source}")]
    Listing {
        page: usize,
        #[source]
        source: PhotosError,
    },

    #[error("Ingestion task is no longer running")]
    IngestClosed,
}

/// A single item that could not be downloaded this cycle
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download timed out")]
    Timeout,

    #[error(transparent)]
    Source(#[from] PhotosError),
}

/// Errors surfaced by the serving layer
#[derive(Error, Debug)]
pub enum ServeError {
    /// The download queue was closed, usually during shutdown
    #[error("Service unavailable")]
    Unavailable,
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServeError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for serving results
pub type ServeResult<T> = Result<T, ServeError>;
