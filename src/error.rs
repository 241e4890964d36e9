//! Error types
//!
//! `UploadError` is the per-request failure taxonomy of the upload resolver.
//! `AppError` covers everything that can stop the process from starting.

use std::io;

/// Terminal failure of a single upload request. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Missing or malformed path segments
    #[error("invalid upload path")]
    InvalidRequest,

    /// The resolved path left the upload root
    #[error("access outside the upload root denied")]
    AccessDenied,

    #[error("upload not found")]
    NotFound,

    /// Any I/O failure other than a missing file
    #[error("failed to read upload: {0}")]
    InternalError(#[source] io::Error),
}

impl From<io::Error> for UploadError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::InternalError(err)
        }
    }
}

/// Startup errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address '{addr}': {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("upload root '{0}' must be an absolute UTF-8 path")]
    UploadRoot(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
