//! Joins between record sets of two indices
//!
//! Only index pairs listed in the join table can be joined; any other pair
//! falls back to concatenating both sets. A known pair is joined with a nested
//! loop on key equality. Left records without a match are dropped (inner join).

use tracing::{debug, warn};

use super::FlatRecord;
use super::normalize::INDEX_FIELD;

/// Fields that must be equal across the two sides for a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSpec {
    pub left_key: &'static str,
    pub right_key: &'static str,
}

/// Known joinable index pairs, keyed by `<left>-<right>`
const JOIN_SPECS: &[(&str, JoinSpec)] = &[
    (
        "file-specimen",
        JoinSpec {
            left_key: "specimen",
            right_key: "biosampleId",
        },
    ),
    (
        "specimen-file",
        JoinSpec {
            left_key: "biosampleId",
            right_key: "specimen",
        },
    ),
];

/// Immutable table of join specifications
#[derive(Debug, Clone, Copy)]
pub struct JoinTable {
    specs: &'static [(&'static str, JoinSpec)],
}

impl Default for JoinTable {
    fn default() -> Self {
        Self { specs: JOIN_SPECS }
    }
}

impl JoinTable {
    /// Name of the ordered pair, e.g. `file-specimen`
    pub fn pair_name(left: &str, right: &str) -> String {
        format!("{left}-{right}")
    }

    pub fn get(&self, pair: &str) -> Option<JoinSpec> {
        self.specs
            .iter()
            .find(|(name, _)| *name == pair)
            .map(|(_, spec)| *spec)
    }

    pub fn is_joinable(&self, pair: &str) -> bool {
        self.get(pair).is_some()
    }
}

/// Joins two flat record sets
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinEngine {
    table: JoinTable,
}

impl JoinEngine {
    pub fn new(table: JoinTable) -> Self {
        Self { table }
    }

    /// Join `left` and `right` under the given pair name
    ///
    /// # Returns
    /// * Inner-join result for a known pair, `left ++ right` otherwise
    pub fn join(&self, left: Vec<FlatRecord>, right: Vec<FlatRecord>, pair: &str) -> Vec<FlatRecord> {
        let Some(spec) = self.table.get(pair) else {
            warn!("No join specification for '{}', concatenating record sets", pair);
            let mut combined = left;
            combined.extend(right);
            return combined;
        };

        let mut joined = Vec::new();
        for l in &left {
            let Some(key) = l.get(spec.left_key) else {
                continue;
            };
            for r in right.iter().filter(|r| r.get(spec.right_key) == Some(key)) {
                joined.push(Self::merge(l, r, spec));
            }
        }

        debug!(
            "Joined {} x {} records on {} = {}: {} rows",
            left.len(),
            right.len(),
            spec.left_key,
            spec.right_key,
            joined.len()
        );
        joined
    }

    /// Copy of `left` with right-side fields added; left wins on shared names
    fn merge(left: &FlatRecord, right: &FlatRecord, spec: JoinSpec) -> FlatRecord {
        let mut merged = left.clone();
        for (key, value) in right.iter() {
            if key == INDEX_FIELD || key == spec.right_key {
                continue;
            }
            merged.insert_if_absent(key, value);
        }
        merged
    }
}
