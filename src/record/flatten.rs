//! Nested document flattening
//!
//! A document is walked depth-first in document order. Object keys extend the
//! path with `key.`; array elements keep the path of their array, so fields of
//! repeated entries land on the same key and are merged with
//! [`RECORD_SEPARATOR`](super::RECORD_SEPARATOR).
//!
//! Arrays follow a one-shot policy: the first scalar element causes all scalar
//! elements of the array to be joined into one value, and the rest of the array
//! is not visited. Structured elements seen before that point have already been
//! recursed into.

use serde_json::Value;

use super::FlatRecord;

/// Default nesting limit
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Flattens nested documents into [`FlatRecord`]s
#[derive(Debug, Clone, Copy)]
pub struct Flattener {
    max_depth: usize,
}

impl Default for Flattener {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Flattener {
    /// Create a flattener with a custom nesting limit
    ///
    /// Subtrees nested deeper than the limit are stored as compact JSON text.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Flatten a document
    ///
    /// Only object documents produce keys; any other root yields an empty record.
    pub fn flatten(&self, doc: &Value) -> FlatRecord {
        let mut record = FlatRecord::new();
        if let Value::Object(_) = doc {
            let mut path = String::new();
            self.visit(doc, &mut path, 0, &mut record);
        }
        record
    }

    fn visit(&self, node: &Value, path: &mut String, depth: usize, out: &mut FlatRecord) {
        if depth > self.max_depth && is_structured(node) {
            out.append(leaf_key(path), node.to_string());
            return;
        }

        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    let mark = path.len();
                    path.push_str(key);
                    path.push('.');
                    self.visit(child, path, depth + 1, out);
                    path.truncate(mark);
                }
            }
            Value::Array(items) => {
                for item in items {
                    if is_structured(item) {
                        self.visit(item, path, depth + 1, out);
                    } else {
                        let joined = items
                            .iter()
                            .filter(|v| !is_structured(v))
                            .map(scalar_text)
                            .collect::<Vec<_>>()
                            .join(super::RECORD_SEPARATOR);
                        out.append(leaf_key(path), joined);
                        break;
                    }
                }
            }
            scalar => out.append(leaf_key(path), scalar_text(scalar)),
        }
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn leaf_key(path: &str) -> &str {
    path.strip_suffix('.').unwrap_or(path)
}

/// Text form of a scalar value; null becomes the empty string
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
