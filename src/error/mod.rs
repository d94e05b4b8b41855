//! Error handling for the record pipeline.
//!
//! This module provides:
//! - The crate-wide [`PortalError`] taxonomy (caller errors, store errors, export errors)
//! - Structured error information extracted from store error responses
//!
//! # Example
//!
//! ```rust
//! use portal_export::error::{PortalError, Result};
//!
//! fn parse_filter(raw: &str) -> Result<(&str, &str)> {
//!     raw.split_once('=')
//!         .ok_or_else(|| PortalError::InvalidQuerySpec(format!("missing '=' in '{raw}'")))
//! }
//!
//! assert!(parse_filter("sex.text").is_err());
//! ```

pub mod kinds;
pub mod store;

// Re-export commonly used types
pub use kinds::{ConfigError, PortalError, Result};
pub use store::StoreErrorInfo;
