//! Index metadata: known indices, default display columns and addressable fields
//!
//! The available columns of an index are enumerated from its field-mapping
//! description (`<mapping_dir>/<index>.json`), which has the shape of an
//! Elasticsearch mapping: `{"properties": {"field": {"properties": {...}}}}`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, PortalError, Result};

/// Logical indices exposed by the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Index {
    File,
    Organism,
    Specimen,
    Dataset,
    Article,
    Analysis,
    Experiment,
    ProtocolFiles,
    ProtocolSamples,
    ProtocolAnalysis,
}

impl Index {
    pub const ALL: [Index; 10] = [
        Index::File,
        Index::Organism,
        Index::Specimen,
        Index::Dataset,
        Index::Article,
        Index::Analysis,
        Index::Experiment,
        Index::ProtocolFiles,
        Index::ProtocolSamples,
        Index::ProtocolAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Index::File => "file",
            Index::Organism => "organism",
            Index::Specimen => "specimen",
            Index::Dataset => "dataset",
            Index::Article => "article",
            Index::Analysis => "analysis",
            Index::Experiment => "experiment",
            Index::ProtocolFiles => "protocol_files",
            Index::ProtocolSamples => "protocol_samples",
            Index::ProtocolAnalysis => "protocol_analysis",
        }
    }

    /// Columns shown by default for this index
    pub fn default_columns(&self) -> &'static [&'static str] {
        match self {
            Index::File => &[
                "study.accession",
                "experiment.accession",
                "species.text",
                "experiment.assayType",
                "experiment.target",
                "specimen",
                "run.instrument",
                "experiment.standardMet",
                "paperPublished",
            ],
            Index::Organism => &[
                "biosampleId",
                "sex.text",
                "organism.text",
                "breed.text",
                "standardMet",
                "paperPublished",
            ],
            Index::Specimen => &[
                "biosampleId",
                "material.text",
                "cellType.text",
                "organism.sex.text",
                "organism.organism.text",
                "organism.breed.text",
                "standardMet",
                "paperPublished",
            ],
            Index::Dataset => &[
                "accession",
                "title",
                "species.text",
                "archive",
                "assayType",
                "standardMet",
                "paperPublished",
            ],
            Index::Article => &["title", "year", "datasetSource", "journal"],
            Index::Analysis => &[
                "accession",
                "datasetAccession",
                "title",
                "organism.text",
                "assayType",
                "analysisType",
                "standardMet",
            ],
            Index::Experiment => &["accession", "assayType", "experimentTarget", "standardMet"],
            Index::ProtocolFiles => &["name", "experimentTarget", "assayType"],
            Index::ProtocolSamples => &["protocolName", "key", "universityName", "protocolDate"],
            Index::ProtocolAnalysis => &[
                "analysisType",
                "protocolName",
                "key",
                "universityName",
                "protocolDate",
            ],
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Index {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        Index::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| PortalError::InvalidQuerySpec(format!("unknown index '{s}'")))
    }
}

/// Enumerate dotted field paths from a mapping description
///
/// Properties with nested `properties` are descended into; every other
/// property is emitted as a path. Order follows the mapping document.
pub fn parse_fields(mapping: &Value) -> Vec<String> {
    let mut fields = Vec::new();
    let mut path = Vec::new();
    collect_fields(mapping, &mut path, &mut fields);
    fields
}

fn collect_fields<'a>(node: &'a Value, path: &mut Vec<&'a str>, out: &mut Vec<String>) {
    let Some(Value::Object(properties)) = node.get("properties") else {
        return;
    };
    for (name, prop) in properties {
        path.push(name);
        if prop.get("properties").is_some() {
            collect_fields(prop, path, out);
        } else {
            out.push(path.join("."));
        }
        path.pop();
    }
}

/// Available and default columns of one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexColumns {
    pub columns: Vec<String>,
    pub defaults: Vec<String>,
}

/// Columns of every known index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnCatalog(IndexMap<String, IndexColumns>);

impl ColumnCatalog {
    /// Load mapping descriptions for all known indices from a directory
    ///
    /// # Arguments
    /// * `dir` - Directory containing `<index>.json` files
    ///
    /// # Returns
    /// * `Result<ColumnCatalog>` - Catalog, or a configuration error naming the bad file
    pub fn load(dir: &Path) -> Result<Self> {
        let mut catalog = IndexMap::new();
        for index in Index::ALL {
            let file = dir.join(format!("{}.json", index.as_str()));
            let content = std::fs::read_to_string(&file)
                .map_err(|_| ConfigError::FileNotFound(file.display().to_string()))?;
            let mapping: Value = serde_json::from_str(&content).map_err(|e| {
                ConfigError::InvalidFormat(format!("{}: {}", file.display(), e))
            })?;

            let entry = Self::entry(index, &mapping);
            debug!("Loaded {} columns for index '{}'", entry.columns.len(), index);
            catalog.insert(index.as_str().to_string(), entry);
        }
        Ok(Self(catalog))
    }

    /// Columns of one index from its mapping description
    pub fn entry(index: Index, mapping: &Value) -> IndexColumns {
        IndexColumns {
            columns: parse_fields(mapping),
            defaults: index.default_columns().iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn get(&self, index: Index) -> Option<&IndexColumns> {
        self.0.get(index.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexColumns)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
