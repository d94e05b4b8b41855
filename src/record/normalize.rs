//! Hit normalization
//!
//! Every record carries the name of the index it came from. Documents of the
//! `file` index have no filename in their body because the document id is the
//! filename, so it is copied in.

use serde_json::{Map, Value};

use super::{FlatRecord, Flattener};
use crate::metadata::Index;
use crate::store::Hit;

/// Field holding the origin index name
pub const INDEX_FIELD: &str = "index";

/// Field synthesized from the document id for the file index
pub const FILENAME_FIELD: &str = "filename";

/// Converts raw hits into normalized documents and flat records
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordNormalizer {
    flattener: Flattener,
}

impl RecordNormalizer {
    pub fn new(flattener: Flattener) -> Self {
        Self { flattener }
    }

    /// Annotate a hit's document with its origin index
    ///
    /// A non-object document body is replaced by an empty object.
    pub fn normalize(&self, hit: Hit) -> Value {
        let mut doc = match hit.source {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        doc.insert(INDEX_FIELD.to_string(), Value::String(hit.index.clone()));
        if hit.index == Index::File.as_str() {
            doc.insert(FILENAME_FIELD.to_string(), Value::String(hit.id));
        }

        Value::Object(doc)
    }

    /// Normalize and flatten one hit
    pub fn to_record(&self, hit: Hit) -> FlatRecord {
        let doc = self.normalize(hit);
        self.flattener.flatten(&doc)
    }
}
