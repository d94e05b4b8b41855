//! Flat record model and the transformations applied to it
//!
//! This module provides:
//! - [`FlatRecord`]: a document reduced to dotted-path keys and string values
//! - [`normalize`]: hit annotation with its origin index
//! - [`flatten`]: nested document to flat record conversion
//! - [`join`]: index-pair specific joins of two record sets
//! - [`project`]: column selection and header derivation

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};

pub mod flatten;
pub mod join;
pub mod normalize;
pub mod project;

pub use flatten::Flattener;
pub use join::{JoinEngine, JoinSpec, JoinTable};
pub use normalize::RecordNormalizer;
pub use project::{ColumnProjector, header_label};

/// Separator placed between values merged at the same path
pub const RECORD_SEPARATOR: &str = ",\n";

/// A document reduced to a single level of dotted-path keys
///
/// Keys keep their first-encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord(IndexMap<String, String>);

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a value, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set a value, or append it to the existing one with [`RECORD_SEPARATOR`]
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        match self.0.entry(key.into()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.push_str(RECORD_SEPARATOR);
                existing.push_str(&value.into());
            }
            Entry::Vacant(slot) => {
                slot.insert(value.into());
            }
        }
    }

    /// Set a value only if the key is absent
    pub fn insert_if_absent(&mut self, key: &str, value: &str) {
        if !self.0.contains_key(key) {
            self.0.insert(key.to_string(), value.to_string());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    /// Individual values stored at `key`, split on [`RECORD_SEPARATOR`]
    pub fn values_of(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|v| v.split(RECORD_SEPARATOR).collect())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_merges_in_order() {
        let mut record = FlatRecord::new();
        record.append("experiment.target", "CTCF");
        record.append("experiment.target", "H3K4me3");
        assert_eq!(record.get("experiment.target"), Some("CTCF,\nH3K4me3"));
        assert_eq!(record.values_of("experiment.target"), vec!["CTCF", "H3K4me3"]);
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let mut record: FlatRecord = [("index", "file")].into_iter().collect();
        record.insert_if_absent("index", "specimen");
        record.insert_if_absent("x", "1");
        assert_eq!(record.get("index"), Some("file"));
        assert_eq!(record.get("x"), Some("1"));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut record: FlatRecord = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        record.remove("b");
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let record: FlatRecord = [("biosampleId", "SAMEA1"), ("sex.text", "female")]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"biosampleId":"SAMEA1","sex.text":"female"}"#
        );
    }
}
