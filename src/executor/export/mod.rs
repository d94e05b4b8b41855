//! Export of flat records to delimited files
//!
//! This module provides:
//! - Export format lookup with a lenient CSV fallback
//! - A delimited writer producing a labeled header row and one row per record
//! - Progress tracking with real-time feedback
//!
//! These components are orchestrated by the **ExportCoordinator**.
//!
//! # Example
//!
//! ```no_run
//! use portal_export::executor::export::{
//!     DelimitedWriter, ExportCoordinator, ExportFormat, ProgressTracker,
//! };
//! use portal_export::record::ColumnProjector;
//!
//! # async fn run(records: Vec<portal_export::record::FlatRecord>) -> portal_export::Result<()> {
//! let format = ExportFormat::lookup(Some("tsv"));
//! let path = std::path::PathBuf::from(format.default_filename());
//! let projector = ColumnProjector::new(&["biosampleId", "organism.breed.text"]);
//! let writer = DelimitedWriter::new(&path, format, projector).await?;
//!
//! let mut coordinator =
//!     ExportCoordinator::new(Box::new(writer), ProgressTracker::hidden(), path, format);
//! let result = coordinator.execute(&records).await?;
//! println!("{} rows", result.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod progress;
pub mod writers;

pub use coordinator::{ExportCoordinator, ExportResult};
pub use progress::ProgressTracker;
pub use writers::{DelimitedWriter, ExportFormat, FormatWriter};
