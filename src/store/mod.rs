//! Document store search contract
//!
//! The pipeline never talks to a concrete store directly. Everything goes
//! through [`SearchStore`], which models the narrow search contract of an
//! Elasticsearch-compatible index: a paged search returning hits and a declared
//! total, plus single-document point lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[cfg(test)]
pub(crate) mod memory;

/// One document returned by a search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Origin index name
    #[serde(rename = "_index")]
    pub index: String,
    /// Unique document identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Document body
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl Hit {
    pub fn new(index: impl Into<String>, id: impl Into<String>, source: Value) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            source,
        }
    }
}

/// A single search request against one or more indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    /// Indices to search (queried as one combined target)
    pub indices: Vec<String>,
    /// Source fields to return, empty for the full document
    pub source: Vec<String>,
    /// Page size
    pub size: usize,
    /// Page offset
    pub from: usize,
    /// Sort spec in `field:asc,field:desc` form
    pub sort: Option<String>,
    /// Free-text query string
    pub q: Option<String>,
    /// Structured query body
    pub body: Value,
}

impl SearchRequest {
    /// Create a request for the given indices with an empty body
    pub fn new(indices: Vec<String>) -> Self {
        Self {
            indices,
            body: Value::Object(Default::default()),
            ..Default::default()
        }
    }

    /// Copy of this request positioned at another page
    pub fn page(&self, from: usize, size: usize) -> Self {
        Self {
            from,
            size,
            ..self.clone()
        }
    }

    /// Combined index target, e.g. `file,specimen`
    pub fn index_target(&self) -> String {
        self.indices.join(",")
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Hits on this page
    pub hits: Vec<Hit>,
    /// Total number of documents matching the query
    pub total: u64,
    /// Aggregation results, if any were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

/// Search contract implemented by document stores
///
/// Implementations must be safe for concurrent use by simultaneous requests.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Run one paged search
    ///
    /// # Arguments
    /// * `request` - Indices, fields, paging, sort, free-text query and body
    ///
    /// # Returns
    /// * `Result<SearchPage>` - Hits and declared total, or a store error
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage>;

    /// Look up a single document by free-text query
    ///
    /// # Returns
    /// * `Result<Option<Hit>>` - The first matching document, if any
    async fn lookup(&self, indices: &[String], q: &str) -> Result<Option<Hit>> {
        let mut request = SearchRequest::new(indices.to_vec());
        request.size = 1;
        request.from = 0;
        request.q = Some(q.to_string());
        let page = self.search(&request).await?;
        Ok(page.hits.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_keeps_query() {
        let mut request = SearchRequest::new(vec!["file".to_string()]);
        request.sort = Some("species.text:asc".to_string());
        request.body = json!({"aggs": {}});

        let page = request.page(100, 50);
        assert_eq!(page.from, 100);
        assert_eq!(page.size, 50);
        assert_eq!(page.sort, request.sort);
        assert_eq!(page.body, request.body);
    }

    #[test]
    fn test_index_target() {
        let request = SearchRequest::new(vec!["file".to_string(), "specimen".to_string()]);
        assert_eq!(request.index_target(), "file,specimen");
    }

    #[test]
    fn test_hit_deserializes_from_store_shape() {
        let hit: Hit = serde_json::from_value(json!({
            "_index": "file",
            "_id": "ERR123.fastq.gz",
            "_score": 1.0,
            "_source": {"specimen": "SAMEA1"}
        }))
        .unwrap();
        assert_eq!(hit.index, "file");
        assert_eq!(hit.id, "ERR123.fastq.gz");
        assert_eq!(hit.source["specimen"], "SAMEA1");
    }
}
