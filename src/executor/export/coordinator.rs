//! Export coordinator for orchestrating export operations
//!
//! Brings together a record set, progress tracking and a format writer.
//! Records are written in batches; a failed or cancelled export removes its
//! partial file.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PortalError, Result};
use crate::record::FlatRecord;

use super::progress::ProgressTracker;
use super::writers::{ExportFormat, FormatWriter};

/// Records handed to the writer per batch
const WRITE_BATCH_SIZE: usize = 10_000;

/// Result of an export operation
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    /// Output file
    pub path: PathBuf,
    /// Format written
    #[serde(serialize_with = "serialize_format")]
    pub format: ExportFormat,
    /// Number of records exported
    pub rows_written: u64,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
}

fn serialize_format<S: serde::Serializer>(
    format: &ExportFormat,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(format.extension())
}

/// Coordinator for export operations
pub struct ExportCoordinator {
    /// Format writer for output
    writer: Box<dyn FormatWriter>,
    /// Progress tracker for user feedback
    tracker: ProgressTracker,
    /// Destination, removed again if the export fails
    path: PathBuf,
    /// Format of the destination
    format: ExportFormat,
    /// Cancellation token for aborting export
    cancel_token: Option<CancellationToken>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(
        writer: Box<dyn FormatWriter>,
        tracker: ProgressTracker,
        path: PathBuf,
        format: ExportFormat,
    ) -> Self {
        Self {
            writer,
            tracker,
            path,
            format,
            cancel_token: None,
        }
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Write all records and finalize the output
    ///
    /// On cancellation or any write error the partial file is removed and
    /// the error is returned.
    ///
    /// # Returns
    /// * `Result<ExportResult>` - Export statistics or error
    pub async fn execute(&mut self, records: &[FlatRecord]) -> Result<ExportResult> {
        let start_time = Instant::now();
        info!("Exporting {} records to {}", records.len(), self.path.display());

        let (exported, file_size_bytes) = match self.write_all(records).await {
            Ok(written) => written,
            Err(e) => {
                self.discard().await;
                return Err(e);
            }
        };
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Export completed: {} records, {} bytes, {} ms",
            exported, file_size_bytes, elapsed_ms
        );

        Ok(ExportResult {
            path: self.path.clone(),
            format: self.format,
            rows_written: exported,
            file_size_bytes,
            elapsed_ms,
        })
    }

    /// Returns the rows written and the final file size
    async fn write_all(&mut self, records: &[FlatRecord]) -> Result<(u64, u64)> {
        self.tracker.set_total(records.len() as u64);
        let mut exported = 0u64;

        for batch in records.chunks(WRITE_BATCH_SIZE) {
            if self.is_cancelled() {
                info!("Export cancelled");
                return Err(PortalError::ExportFailed("export cancelled".to_string()));
            }

            let count = self.writer.write_batch(batch).await?;
            exported += count as u64;
            self.tracker.update(exported);
            debug!("Wrote batch of {} records", count);
        }

        self.writer.finalize().await?;
        self.tracker.finish();

        let file_size_bytes = self.writer.file_size().await?;
        Ok((exported, file_size_bytes))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Close the writer and remove the partial file
    async fn discard(&mut self) {
        info!("Removing partial export {}", self.path.display());
        if let Err(e) = self.writer.finalize().await {
            warn!("Failed to close {}: {}", self.path.display(), e);
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
        self.tracker.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    // Mock format writer for testing
    struct MockWriter {
        written: Vec<FlatRecord>,
        finalized: bool,
    }

    impl MockWriter {
        fn new() -> Self {
            Self {
                written: Vec::new(),
                finalized: false,
            }
        }
    }

    #[async_trait]
    impl FormatWriter for MockWriter {
        async fn write_batch(&mut self, records: &[FlatRecord]) -> Result<usize> {
            self.written.extend_from_slice(records);
            Ok(records.len())
        }

        async fn finalize(&mut self) -> Result<()> {
            self.finalized = true;
            Ok(())
        }

        async fn file_size(&self) -> Result<u64> {
            Ok(self.written.len() as u64 * 100)
        }
    }

    /// Creates its destination and fails on the second batch
    struct FailingWriter {
        path: PathBuf,
        batches: usize,
    }

    #[async_trait]
    impl FormatWriter for FailingWriter {
        async fn write_batch(&mut self, records: &[FlatRecord]) -> Result<usize> {
            self.batches += 1;
            if self.batches == 2 {
                return Err(PortalError::ExportFailed("disk full".to_string()));
            }
            tokio::fs::write(&self.path, format!("{} rows\n", records.len())).await?;
            Ok(records.len())
        }

        async fn finalize(&mut self) -> Result<()> {
            Ok(())
        }

        async fn file_size(&self) -> Result<u64> {
            Ok(tokio::fs::metadata(&self.path).await?.len())
        }
    }

    fn records(n: usize) -> Vec<FlatRecord> {
        (0..n)
            .map(|i| [("accession", format!("PRJEB{i}"))].into_iter().collect())
            .collect()
    }

    #[tokio::test]
    async fn test_coordinator_basic() {
        let mut coordinator = ExportCoordinator::new(
            Box::new(MockWriter::new()),
            ProgressTracker::hidden(),
            PathBuf::from("data.csv"),
            ExportFormat::Csv,
        );
        let result = coordinator.execute(&records(3)).await.unwrap();

        assert_eq!(result.rows_written, 3);
        assert_eq!(result.file_size_bytes, 300);
        assert_eq!(result.format, ExportFormat::Csv);
    }

    #[tokio::test]
    async fn test_coordinator_empty() {
        let mut coordinator = ExportCoordinator::new(
            Box::new(MockWriter::new()),
            ProgressTracker::hidden(),
            PathBuf::from("data.tsv"),
            ExportFormat::Tsv,
        );
        let result = coordinator.execute(&[]).await.unwrap();
        assert_eq!(result.rows_written, 0);
    }

    #[tokio::test]
    async fn test_write_error_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let writer = FailingWriter {
            path: path.clone(),
            batches: 0,
        };
        let mut coordinator = ExportCoordinator::new(
            Box::new(writer),
            ProgressTracker::hidden(),
            path.clone(),
            ExportFormat::Csv,
        );

        let err = coordinator
            .execute(&records(WRITE_BATCH_SIZE * 2 + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::ExportFailed(ref m) if m == "disk full"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cancelled_export_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        std::fs::write(&path, "partial").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let mut coordinator = ExportCoordinator::new(
            Box::new(MockWriter::new()),
            ProgressTracker::hidden(),
            path.clone(),
            ExportFormat::Tsv,
        )
        .with_cancellation(token);

        let err = coordinator.execute(&records(1)).await.unwrap_err();
        assert!(matches!(err, PortalError::ExportFailed(ref m) if m == "export cancelled"));
        assert!(!path.exists());
    }
}
