//! Portal export library
//!
//! Exposes the documents of an Elasticsearch-compatible search index through a
//! flattened, joinable and exportable record model.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: HTTP search client
//! - `error`: Error types and handling
//! - `executor`: Pagination, enrichment, export and request execution
//! - `formatter`: Console output formatting
//! - `metadata`: Index names, default columns and mapping catalog
//! - `query`: Query body construction from filter and aggregation strings
//! - `record`: Flat records, flattening, joins and column projection
//! - `store`: Search store contract
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use portal_export::{Config, DownloadParams, ElasticClient, RecordExecutor};
//!
//! #[tokio::main]
//! async fn main() -> portal_export::Result<()> {
//!     let config = Config::default();
//!     let client = ElasticClient::new(&config.store)?;
//!     let executor = RecordExecutor::new(Arc::new(client), config);
//!
//!     let params = DownloadParams {
//!         indices: vec!["file".to_string()],
//!         join_with: Some("specimen".to_string()),
//!         ..Default::default()
//!     };
//!     let result = executor.download(&params).await?;
//!     println!("{} rows written to {}", result.rows_written, result.path.display());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod metadata;
pub mod query;
pub mod record;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use connection::ElasticClient;
pub use error::{PortalError, Result};
pub use executor::{DownloadParams, RecordExecutor, SearchParams};
pub use record::FlatRecord;
pub use store::{Hit, SearchStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
