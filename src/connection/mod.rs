//! Connection to an Elasticsearch-compatible search node
//!
//! This module provides the HTTP implementation of the [`SearchStore`]
//! contract:
//! - Client construction with basic authentication and TLS options
//! - `_search` requests with paging, source filtering, sort and free-text query
//! - Response decoding (hits, declared total, aggregations)
//! - Error responses mapped to the crate error taxonomy

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::{ConfigError, PortalError, Result, StoreErrorInfo};
use crate::store::{Hit, SearchPage, SearchRequest, SearchStore};

/// HTTP client for a search node
///
/// Cloning is cheap; clones share the underlying connection pool, so one
/// client can serve many simultaneous requests.
#[derive(Clone)]
pub struct ElasticClient {
    /// HTTP client instance
    http: reqwest::Client,

    /// Base URL without trailing slash
    node: String,

    /// Basic auth credentials
    credentials: Option<(String, Option<String>)>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    hits: RawHits,
    #[serde(default)]
    aggregations: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// `hits.total` is an object since Elasticsearch 7 and a bare number before
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Tracked { value: u64 },
}

impl RawTotal {
    fn value(&self) -> u64 {
        match self {
            RawTotal::Count(n) => *n,
            RawTotal::Tracked { value } => *value,
        }
    }
}

impl ElasticClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `config` - Store connection configuration
    ///
    /// # Returns
    /// * `Result<Self>` - New client or configuration error
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "store".to_string(),
                value: e.to_string(),
            })?;

        let credentials = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));

        Ok(Self {
            http,
            node: config.node.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Node URL without credentials
    pub fn node(&self) -> &str {
        &self.node
    }

    fn search_url(&self, request: &SearchRequest) -> String {
        if request.indices.is_empty() {
            format!("{}/_search", self.node)
        } else {
            format!("{}/{}/_search", self.node, request.index_target())
        }
    }

    fn query_params(request: &SearchRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("size", request.size.to_string()),
            ("from", request.from.to_string()),
        ];
        if !request.source.is_empty() {
            params.push(("_source", request.source.join(",")));
        }
        if let Some(sort) = request.sort.as_ref().filter(|s| !s.is_empty()) {
            params.push(("sort", sort.clone()));
        }
        if let Some(q) = request.q.as_ref().filter(|s| !s.is_empty()) {
            params.push(("q", q.clone()));
        }
        params
    }

    /// Body sent to the node; totals are tracked exactly so paging terminates
    fn request_body(request: &SearchRequest) -> Value {
        let mut body = match &request.body {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        body.entry("track_total_hits").or_insert(Value::Bool(true));
        Value::Object(body)
    }

    fn decode(body: &str) -> Result<SearchPage> {
        let raw: RawResponse = serde_json::from_str(body).map_err(|e| {
            PortalError::RetrievalFailed(format!("unexpected search response: {e}"))
        })?;
        let total = raw
            .hits
            .total
            .as_ref()
            .map(RawTotal::value)
            .unwrap_or(raw.hits.hits.len() as u64);
        Ok(SearchPage {
            hits: raw.hits.hits,
            total,
            aggregations: raw.aggregations,
        })
    }
}

#[async_trait]
impl SearchStore for ElasticClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let url = self.search_url(request);
        debug!(
            "Searching {} (from={}, size={})",
            request.index_target(),
            request.from,
            request.size
        );

        let mut builder = self
            .http
            .post(&url)
            .query(&Self::query_params(request))
            .json(&Self::request_body(request));
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, password.as_ref());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let info = StoreErrorInfo::from_response(status.as_u16(), &body);
            debug!("Search on {} failed: {}", request.index_target(), info);
            return Err(info.into());
        }

        let page = Self::decode(&body)?;
        trace!("Received {} hits (total {})", page.hits.len(), page.total);
        Ok(page)
    }
}
