//! Format writers for export operations
//!
//! This module provides the export format lookup and a unified interface for
//! writing projected records to delimited files.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{PortalError, Result};
use crate::record::FlatRecord;

pub mod delimited;

pub use delimited::DelimitedWriter;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values
    #[default]
    Csv,
    /// Tab-separated values
    Tsv,
}

impl ExportFormat {
    /// Resolve a requested format token
    ///
    /// Unrecognized or absent tokens resolve to CSV.
    pub fn lookup(token: Option<&str>) -> Self {
        match token.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("csv") => ExportFormat::Csv,
            Some("tsv") => ExportFormat::Tsv,
            Some(other) => {
                tracing::warn!("Unknown export format '{}', using csv", other);
                ExportFormat::Csv
            }
            None => ExportFormat::Csv,
        }
    }

    pub fn delimiter(&self) -> char {
        match self {
            ExportFormat::Csv => ',',
            ExportFormat::Tsv => '\t',
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
        }
    }

    /// Default export file name for this format
    pub fn default_filename(&self) -> String {
        format!("data.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Trait for writing records to different file formats
#[async_trait]
pub trait FormatWriter: Send {
    /// Write a batch of records
    ///
    /// # Arguments
    /// * `records` - Records to write
    ///
    /// # Returns
    /// * `Result<usize>` - Number of records written
    async fn write_batch(&mut self, records: &[FlatRecord]) -> Result<usize>;

    /// Finalize the output (write a header if nothing was written, flush buffers)
    async fn finalize(&mut self) -> Result<()>;

    /// Get the current file size in bytes
    async fn file_size(&self) -> Result<u64>;
}

/// Helper function to create a buffered file writer
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).await.map_err(|e| {
        PortalError::ExportFailed(format!("Failed to create {}: {}", path.display(), e))
    })?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

/// Helper function to validate that the output directory exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(PortalError::ExportFailed(format!(
                "Directory does not exist: {}",
                parent.display()
            )));
        }
    }

    Ok(())
}
