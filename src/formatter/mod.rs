//! Output formatting for command results
//!
//! This module renders what the CLI prints:
//! - Search pages as JSON or as a table of flattened hits
//! - Export summaries
//! - The column catalog

use std::io;

use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::executor::ExportResult;
use crate::metadata::ColumnCatalog;
use crate::record::{FlatRecord, RecordNormalizer};
use crate::store::SearchPage;

pub mod table;

pub use table::TableFormatter;

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Table display
    #[default]
    Table,
}

impl OutputFormat {
    /// Parse an output format name, falling back to a table
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "json-pretty" | "jsonpretty" => OutputFormat::JsonPretty,
            "table" => OutputFormat::Table,
            other => {
                warn!("Unknown output format '{}', using table", other);
                OutputFormat::Table
            }
        }
    }
}

/// Renders command results
pub struct Formatter {
    format: OutputFormat,
    table: TableFormatter,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            table: TableFormatter::new(),
        }
    }

    /// Format a search page
    ///
    /// Tables show one row per hit, normalized and flattened, followed by the
    /// declared total. JSON output is the page as returned by the store.
    pub fn format_page(&self, page: &SearchPage) -> Result<String> {
        match self.format {
            OutputFormat::Table => {
                let normalizer = RecordNormalizer::default();
                let records: Vec<FlatRecord> = page
                    .hits
                    .iter()
                    .cloned()
                    .map(|hit| normalizer.to_record(hit))
                    .collect();
                let mut output = self.table.format_records(&records);
                if let Some(aggs) = &page.aggregations {
                    output.push('\n');
                    output.push_str(&to_json(aggs, true)?);
                }
                output.push_str(&format!("\n{} of {} hits", page.hits.len(), page.total));
                Ok(output)
            }
            _ => self.json(page),
        }
    }

    pub fn format_export(&self, result: &ExportResult) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.table.format_pairs(
                ["export", ""],
                [
                    ("path", result.path.display().to_string()),
                    ("format", result.format.to_string()),
                    ("rows", result.rows_written.to_string()),
                    ("bytes", result.file_size_bytes.to_string()),
                    ("elapsed (ms)", result.elapsed_ms.to_string()),
                ],
            )),
            _ => self.json(result),
        }
    }

    /// Format the column catalog, one row per index in table mode
    pub fn format_catalog(&self, catalog: &ColumnCatalog) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.table.format_pairs(
                ["index", "default columns"],
                catalog
                    .iter()
                    .map(|(index, entry)| (index, entry.defaults.join("\n"))),
            )),
            _ => self.json(catalog),
        }
    }

    fn json<T: Serialize>(&self, value: &T) -> Result<String> {
        to_json(value, self.format == OutputFormat::JsonPretty)
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    Ok(text.map_err(io::Error::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExportFormat;
    use crate::store::Hit;
    use serde_json::json;
    use std::path::PathBuf;

    fn page() -> SearchPage {
        SearchPage {
            hits: vec![Hit::new(
                "file",
                "ERR1.fastq.gz",
                json!({"specimen": "SAMEA1", "run": {"accession": "ERR1"}}),
            )],
            total: 7,
            aggregations: None,
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("json-pretty"), OutputFormat::JsonPretty);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Table);
    }

    #[test]
    fn test_page_table_shows_flattened_hits() {
        let output = Formatter::new(OutputFormat::Table).format_page(&page()).unwrap();
        assert!(output.contains("run.accession"));
        assert!(output.contains("ERR1.fastq.gz"));
        assert!(output.ends_with("1 of 7 hits"));
    }

    #[test]
    fn test_page_json_keeps_store_shape() {
        let output = Formatter::new(OutputFormat::Json).format_page(&page()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["total"], 7);
        assert_eq!(value["hits"][0]["_id"], "ERR1.fastq.gz");
    }

    #[test]
    fn test_export_summary() {
        let result = ExportResult {
            path: PathBuf::from("data.tsv"),
            format: ExportFormat::Tsv,
            rows_written: 12,
            file_size_bytes: 480,
            elapsed_ms: 3,
        };
        let output = Formatter::new(OutputFormat::Table).format_export(&result).unwrap();
        assert!(output.contains("data.tsv"));
        assert!(output.contains("480"));

        let output = Formatter::new(OutputFormat::Json).format_export(&result).unwrap();
        assert!(output.contains("\"format\":\"tsv\""));
    }
}
