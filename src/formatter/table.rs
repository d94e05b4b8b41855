//! Table formatting for flat records using tabled
//!
//! Columns come from the union of record keys in first-encounter order, so
//! heterogeneous hits from several indices share one table.

use indexmap::IndexSet;
use tabled::{
    Table,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Columns, object::Rows, width::Width},
};

use crate::record::FlatRecord;

/// Maximum width for a single column (characters)
const DEFAULT_MAX_COLUMN_WIDTH: usize = 40;

/// Table formatter for record sets
pub struct TableFormatter {
    /// Maximum column width
    max_column_width: usize,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            max_column_width: DEFAULT_MAX_COLUMN_WIDTH,
        }
    }

    /// Set maximum column width
    pub fn with_max_column_width(mut self, width: usize) -> Self {
        self.max_column_width = width;
        self
    }

    /// Render records with a header of their field paths
    pub fn format_records(&self, records: &[FlatRecord]) -> String {
        if records.is_empty() {
            return "(empty result set)".to_string();
        }

        let fields: IndexSet<&str> = records.iter().flat_map(|r| r.keys()).collect();
        let mut builder = Builder::default();
        builder.push_record(fields.iter().copied());
        for record in records {
            builder.push_record(fields.iter().map(|f| record.get(f).unwrap_or("")));
        }

        self.finish(builder.build(), fields.len())
    }

    /// Render a two-column key/value table
    pub fn format_pairs<K, V>(&self, header: [&str; 2], pairs: impl IntoIterator<Item = (K, V)>) -> String
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut builder = Builder::default();
        builder.push_record(header);
        for (key, value) in pairs {
            let row: [String; 2] = [key.into(), value.into()];
            builder.push_record(row);
        }
        self.finish(builder.build(), 2)
    }

    fn finish(&self, mut table: Table, columns: usize) -> String {
        table.with(Style::modern());
        for i in 0..columns {
            table.with(Modify::new(Columns::new(i..=i)).with(Width::wrap(self.max_column_width)));
        }
        table.with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heterogeneous_records_share_columns() {
        let records: Vec<FlatRecord> = vec![
            [("index", "file"), ("filename", "ERR1.fastq.gz")].into_iter().collect(),
            [("index", "specimen"), ("biosampleId", "SAMEA1")].into_iter().collect(),
        ];
        let output = TableFormatter::new().format_records(&records);

        assert!(output.contains("filename"));
        assert!(output.contains("biosampleId"));
        assert!(output.contains("SAMEA1"));
    }

    #[test]
    fn test_empty_records() {
        assert_eq!(TableFormatter::new().format_records(&[]), "(empty result set)");
    }

    #[test]
    fn test_long_values_wrap() {
        let long = "x".repeat(30);
        let records: Vec<FlatRecord> = vec![[("k", long.as_str())].into_iter().collect()];
        let output = TableFormatter::new().with_max_column_width(10).format_records(&records);
        assert!(!output.contains(&long));
    }
}
