//! Column projection and header labels

use super::FlatRecord;

/// Path segment dropped from header labels
const TEXT_SEGMENT: &str = "text";

/// Derive a human-readable header label from a column path
///
/// The leading segment of a multi-segment path is dropped, as are `text`
/// segments; what remains is joined with spaces. If nothing remains (as for
/// `sex.text`) the label keeps the leading segment instead.
pub fn header_label(path: &str) -> String {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() == 1 {
        return path.to_string();
    }

    let label = segments[1..]
        .iter()
        .filter(|s| **s != TEXT_SEGMENT)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if !label.is_empty() {
        return label;
    }

    segments
        .iter()
        .filter(|s| **s != TEXT_SEGMENT)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Restricts records to the caller's columns, in the caller's order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProjector {
    columns: Vec<String>,
}

impl ColumnProjector {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    /// Header labels for every column
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| header_label(c)).collect()
    }

    /// Values of one record in column order; absent fields are empty
    pub fn row<'a>(&self, record: &'a FlatRecord) -> Vec<&'a str> {
        self.columns
            .iter()
            .map(|c| record.get(c).unwrap_or(""))
            .collect()
    }
}
