//! In-memory store used by unit tests

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Hit, SearchPage, SearchRequest, SearchStore};
use crate::error::{PortalError, Result};

/// Store holding documents per index, recording every request it serves
#[derive(Default)]
pub(crate) struct MemoryStore {
    indices: BTreeMap<String, Vec<Hit>>,
    requests: Mutex<Vec<SearchRequest>>,
    fail_at_offset: Option<usize>,
    delay: Option<Duration>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_docs(mut self, index: &str, docs: Vec<(String, Value)>) -> Self {
        let hits = docs
            .into_iter()
            .map(|(id, source)| Hit::new(index, id, source))
            .collect();
        self.indices.insert(index.to_string(), hits);
        self
    }

    /// Fill an index with `count` generated documents
    pub(crate) fn with_generated(self, index: &str, count: usize) -> Self {
        let docs = (0..count)
            .map(|i| (format!("{index}-{i}"), serde_json::json!({ "n": i })))
            .collect();
        self.with_docs(index, docs)
    }

    /// Make every page request starting at or after `offset` fail
    pub(crate) fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    /// Hold every request for `delay` before answering
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn matches(hit: &Hit, q: Option<&str>) -> bool {
        let Some((field, value)) = q.and_then(|q| q.split_once(':')) else {
            return true;
        };
        let value = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            Some(quoted) => quoted.replace("\\\"", "\"").replace("\\\\", "\\"),
            None => value.to_string(),
        };
        match hit.source.get(field) {
            Some(Value::String(s)) => *s == value,
            Some(other) => other.to_string() == value,
            None => false,
        }
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(offset) = self.fail_at_offset {
            if request.from >= offset {
                return Err(PortalError::RetrievalFailed(
                    "[503] search_phase_execution_exception".to_string(),
                ));
            }
        }

        let mut all = Vec::new();
        for index in &request.indices {
            match self.indices.get(index) {
                Some(hits) => all.extend(
                    hits.iter()
                        .filter(|h| Self::matches(h, request.q.as_deref()))
                        .cloned(),
                ),
                None => return Err(PortalError::IndicesIncompatible(request.index_target())),
            }
        }

        let total = all.len() as u64;
        let hits = all.into_iter().skip(request.from).take(request.size).collect();
        Ok(SearchPage {
            hits,
            total,
            aggregations: None,
        })
    }
}
