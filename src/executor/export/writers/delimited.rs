//! Delimited text writer for export operations
//!
//! Writes one header row of derived labels followed by one row per record,
//! in the projector's column order. Values containing the delimiter, a quote
//! or a line break are quoted, with inner quotes doubled.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{PortalError, Result};
use crate::record::{ColumnProjector, FlatRecord};

use super::{ExportFormat, FormatWriter, create_writer, validate_path};

/// Writer for comma- or tab-delimited output
pub struct DelimitedWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Delimiter and extension
    format: ExportFormat,
    /// Column selection and labels
    projector: ColumnProjector,
    /// Whether the header row has been written
    headers_written: bool,
    /// Number of records written
    written: usize,
}

impl DelimitedWriter {
    /// Create a new delimited writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `format` - Export format (delimiter)
    /// * `projector` - Columns to write, in order
    pub async fn new(path: &Path, format: ExportFormat, projector: ColumnProjector) -> Result<Self> {
        validate_path(path)?;
        let writer = create_writer(path).await?;

        debug!("Created {} writer for: {}", format, path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            format,
            projector,
            headers_written: false,
            written: 0,
        })
    }

    async fn write_line(&mut self, fields: &[&str]) -> Result<()> {
        let delimiter = self.format.delimiter();
        let line = fields
            .iter()
            .map(|v| escape_value(v, delimiter))
            .collect::<Vec<_>>()
            .join(&delimiter.to_string());

        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PortalError::ExportFailed(format!("Failed to write row: {}", e)))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| PortalError::ExportFailed(format!("Failed to write newline: {}", e)))?;
        Ok(())
    }

    async fn write_headers(&mut self) -> Result<()> {
        let labels = self.projector.headers();
        let fields: Vec<&str> = labels.iter().map(String::as_str).collect();
        self.write_line(&fields).await?;
        self.headers_written = true;
        debug!("Wrote headers: {} columns", fields.len());
        Ok(())
    }
}

/// Quote a value if it contains the delimiter, a quote or a line break
pub fn escape_value(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[async_trait]
impl FormatWriter for DelimitedWriter {
    async fn write_batch(&mut self, records: &[FlatRecord]) -> Result<usize> {
        if !self.headers_written {
            self.write_headers().await?;
        }

        for record in records {
            let row = self.projector.row(record);
            self.write_line(&row).await?;
        }

        self.written += records.len();
        debug!("Wrote {} records (total: {})", records.len(), self.written);
        Ok(records.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        if !self.headers_written {
            self.write_headers().await?;
        }
        self.writer
            .flush()
            .await
            .map_err(|e| PortalError::ExportFailed(format!("Failed to flush file: {}", e)))?;

        debug!("Finalized {} ({} records)", self.path.display(), self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            PortalError::ExportFailed(format!("Failed to get file metadata: {}", e))
        })?;
        Ok(metadata.len())
    }
}
