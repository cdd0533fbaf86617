//! Error types for the thumbnail server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Problems with the query string of a thumbnail request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No `file` parameter, or only whitespace
    MissingFile,
    /// The filename tries to leave the uploads directory
    DisallowedName(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::MissingFile => write!(f, "Missing Argument."),
            RequestError::DisallowedName(name) => write!(f, "Image name {} is not allowed.", name),
        }
    }
}

impl std::error::Error for RequestError {}

#[derive(Debug)]
pub enum ThumbnailError {
    Request(RequestError),
    /// Format not among the ones we can decode and re-encode.
    /// `/thumb` redirects to the original instead of returning it.
    Unsupported(String),
    Image(Box<image::ImageError>),
    Cache(thumb_cache::CacheError),
    Io(Box<std::io::Error>),
    Config(String),
    Internal(String),
}

impl fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailError::Request(err) => write!(f, "{}", err),
            ThumbnailError::Unsupported(msg) => write!(f, "Unsupported image: {}", msg),
            ThumbnailError::Image(err) => write!(f, "Image error: {}", err),
            ThumbnailError::Cache(err) => write!(f, "Cache error: {}", err),
            ThumbnailError::Io(err) => write!(f, "IO error: {}", err),
            ThumbnailError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ThumbnailError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ThumbnailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ThumbnailError::Request(err) => Some(err),
            ThumbnailError::Image(err) => Some(err.as_ref()),
            ThumbnailError::Cache(err) => Some(err),
            ThumbnailError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for ThumbnailError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ThumbnailError::Request(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            other => {
                tracing::error!(error = %other, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<RequestError> for ThumbnailError {
    fn from(err: RequestError) -> Self {
        ThumbnailError::Request(err)
    }
}

impl From<image::ImageError> for ThumbnailError {
    fn from(err: image::ImageError) -> Self {
        ThumbnailError::Image(Box::new(err))
    }
}

impl From<thumb_cache::CacheError> for ThumbnailError {
    fn from(err: thumb_cache::CacheError) -> Self {
        ThumbnailError::Cache(err)
    }
}

impl From<std::io::Error> for ThumbnailError {
    fn from(err: std::io::Error) -> Self {
        ThumbnailError::Io(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for ThumbnailError {
    fn from(err: tokio::task::JoinError) -> Self {
        ThumbnailError::Internal(format!("Image task failed: {}", err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ThumbnailError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ThumbnailError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;
