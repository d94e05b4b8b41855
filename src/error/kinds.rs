use std::{fmt, io};

use crate::error::store::StoreErrorInfo;

/// Crate-wide `Result` type using [`PortalError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Top-level error type for record pipeline operations.
///
/// Caller errors (`InvalidQuerySpec`) are reported synchronously with enough
/// detail to fix the request. Store errors abort the whole request; there is
/// no partial result.
#[derive(Debug)]
pub enum PortalError {
    /// A filter, aggregation or request parameter is malformed.
    InvalidQuerySpec(String),

    /// The store could not be reached or answered with an error.
    RetrievalFailed(String),

    /// The store rejected an index combination as non-existent.
    IndicesIncompatible(String),

    /// The export artifact could not be materialized.
    ExportFailed(String),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config or mapping file not found.
    FileNotFound(String),

    /// Invalid file format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalError::InvalidQuerySpec(msg) => write!(f, "Invalid query: {msg}"),
            PortalError::RetrievalFailed(msg) => write!(f, "Retrieval failed: {msg}"),
            PortalError::IndicesIncompatible(indices) => {
                write!(f, "Indices cannot be combined: {indices}")
            }
            PortalError::ExportFailed(msg) => write!(f, "Export failed: {msg}"),
            PortalError::Config(e) => write!(f, "Configuration error: {e}"),
            PortalError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "File not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortalError::Config(e) => Some(e),
            PortalError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

/* ========================= Conversions to PortalError ========================= */

impl From<io::Error> for PortalError {
    fn from(err: io::Error) -> Self {
        PortalError::Io(err)
    }
}

impl From<ConfigError> for PortalError {
    fn from(err: ConfigError) -> Self {
        PortalError::Config(err)
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PortalError::RetrievalFailed(format!("store request timed out: {err}"))
        } else {
            PortalError::RetrievalFailed(err.to_string())
        }
    }
}

impl From<StoreErrorInfo> for PortalError {
    fn from(info: StoreErrorInfo) -> Self {
        if info.is_index_not_found() {
            PortalError::IndicesIncompatible(info.index.clone().unwrap_or_default())
        } else {
            PortalError::RetrievalFailed(info.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for PortalError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PortalError::RetrievalFailed("request timed out".to_string())
    }
}

impl PortalError {
    /// Retrieval aborted by the caller's cancellation token
    pub fn cancelled() -> Self {
        PortalError::RetrievalFailed("request cancelled".to_string())
    }

    /// Whether this error was caused by the caller's request rather than the store.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PortalError::InvalidQuerySpec(_) | PortalError::IndicesIncompatible(_)
        )
    }
}
