use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error information extracted from a store error response.
///
/// Elasticsearch-compatible stores answer failures with a body of the form
/// `{"error": {"type": ..., "reason": ..., "index": ...}, "status": 404}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

const INDEX_NOT_FOUND: &str = "index_not_found_exception";

impl StoreErrorInfo {
    /// Extract error information from an HTTP status and raw response body.
    ///
    /// Bodies that are not JSON (proxies, load balancers) are kept verbatim as
    /// the reason.
    pub fn from_response(status: u16, body: &str) -> Self {
        let mut info = StoreErrorInfo {
            status: Some(status),
            ..Default::default()
        };

        let parsed: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => {
                if !body.trim().is_empty() {
                    info.reason = Some(body.trim().to_string());
                }
                return info;
            }
        };

        match parsed.get("error") {
            Some(Value::Object(err)) => {
                info.error_type = err.get("type").and_then(Value::as_str).map(str::to_string);
                info.reason = err.get("reason").and_then(Value::as_str).map(str::to_string);
                info.index = err
                    .get("index")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| {
                        err.get("resource.id")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    });
            }
            Some(Value::String(reason)) => info.reason = Some(reason.clone()),
            _ => {}
        }

        info
    }

    /// Whether the store rejected the request because an index does not exist.
    pub fn is_index_not_found(&self) -> bool {
        self.error_type.as_deref() == Some(INDEX_NOT_FOUND)
    }

    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for StoreErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "[{status}] ")?;
        }
        match (&self.error_type, &self.reason) {
            (Some(t), Some(r)) => write!(f, "{t}: {r}"),
            (Some(t), None) => write!(f, "{t}"),
            (None, Some(r)) => write!(f, "{r}"),
            (None, None) => write!(f, "store returned an error"),
        }
    }
}
