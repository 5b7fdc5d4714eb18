//! Request/response envelope types for host callbacks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Discriminator of an outbound request envelope.
pub const REQUEST_TYPE: &str = "request";

/// Discriminator of an inbound response envelope.
pub const RESPONSE_TYPE: &str = "response";

/// Correlation id of a request.
///
/// Ids are generated as UUID strings, but hosts that echo numeric ids are
/// still matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl RequestId {
    pub fn generate() -> Self {
        RequestId::String(Uuid::new_v4().to_string())
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(id) => write!(f, "{id}"),
            RequestId::String(id) => f.write_str(id),
        }
    }
}

/// Request posted to the host window.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: RequestId,
    pub path: String,
    pub payload: Value,
}

impl RequestEnvelope {
    pub fn new(id: RequestId, path: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: REQUEST_TYPE,
            id,
            path: path.into(),
            payload,
        }
    }
}

/// Response posted back by the host window.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: RequestId,
    #[serde(default)]
    pub data: Value,
    #[serde(default, rename = "nextPage")]
    pub next_page: Option<Value>,
}

impl ResponseEnvelope {
    /// Parse a raw window message as a response, if it is one.
    pub fn from_message(message: &Value) -> Option<Self> {
        if message.get("type").and_then(Value::as_str) != Some(RESPONSE_TYPE) {
            return None;
        }
        serde_json::from_value(message.clone()).ok()
    }
}

/// What a request resolves with.
#[derive(Debug, Clone, PartialEq)]
pub struct HostResponse {
    pub data: Value,
    /// Pagination cursor; `None` when absent or null.
    pub next_page: Option<Value>,
}

impl From<ResponseEnvelope> for HostResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        Self {
            data: envelope.data,
            next_page: envelope.next_page.filter(|page| !page.is_null()),
        }
    }
}

/// Per-path timeout policy.
#[derive(Debug, Clone)]
pub struct RequestTimeouts {
    default: Duration,
    per_path: HashMap<String, Duration>,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl RequestTimeouts {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            per_path: HashMap::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>, timeout: Duration) -> Self {
        self.per_path.insert(path.into(), timeout);
        self
    }

    /// Get the timeout for a host path.
    pub fn get(&self, path: &str) -> Duration {
        self.per_path.get(path).copied().unwrap_or(self.default)
    }
}

/// JavaScript truthiness, used for pagination cursors and flags sent by hosts.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
