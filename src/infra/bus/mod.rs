//! Request/reply message bus between the dispatcher and the backend executor.
//!
//! The bus only moves bytes. Timeouts are enforced by the caller; an
//! implementation must release any connection it opened when its request
//! future completes or is dropped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub mod memory;
pub mod nats;

pub use memory::{BackendExecutor, MemoryBus};
pub use nats::NatsBus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("could not connect to message bus: {0}")]
    Connect(String),
    #[error("no backend is listening on '{0}'")]
    NoResponders(String),
    #[error("bus request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes `payload` on `subject` and waits for the single reply.
    async fn request(&self, subject: &str, payload: Vec<u8>) -> Result<Vec<u8>, BusError>;
}

/// Payload published to the backend executor.
///
/// `args` is positional: `["execute", database, function, token, json]` or
/// `["query", database, sql]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub args: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub channel: String,
    /// Seconds the caller is willing to wait.
    #[serde(default)]
    pub timeout: u64,
}

impl BackendRequest {
    pub fn verb(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn database(&self) -> Option<&str> {
        self.args.get(1).map(String::as_str)
    }

    /// Function name for `execute`, query text for `query`.
    pub fn target(&self) -> Option<&str> {
        self.args.get(2).map(String::as_str)
    }

    /// The JSON payload of an `execute` request, if any.
    pub fn payload(&self) -> Option<JsonValue> {
        let raw = match self.verb() {
            Some("execute") => self.args.get(4),
            _ => None,
        }?;
        serde_json::from_str(raw).ok()
    }
}

/// Reply from the backend executor.
///
/// `data` is either an object or a JSON-encoded string holding one; the value
/// of interest sits under its `Result` key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackendReply {
    #[serde(default)]
    pub has_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

/// Outcome of decoding reply bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// Success; `None` when the reply carried no `Result`.
    Result(Option<JsonValue>),
    /// The executor reported a failure.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed backend reply: {0}")]
pub struct MalformedReply(pub String);

impl BackendReply {
    pub fn success(result: JsonValue) -> Self {
        Self {
            has_error: false,
            error_message: None,
            data: Some(serde_json::json!({ "Result": result })),
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            has_error: true,
            error_message: Some(message.to_string()),
            data: None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<ReplyOutcome, MalformedReply> {
        let raw: JsonValue = serde_json::from_slice(bytes).map_err(|e| MalformedReply(e.to_string()))?;
        let obj = raw
            .as_object()
            .ok_or_else(|| MalformedReply("expected a JSON object".to_string()))?;

        // Bare `{ "Result": ... }` replies are accepted as success.
        if !obj.contains_key("hasError") {
            if let Some(result) = obj.get("Result") {
                return Ok(ReplyOutcome::Result(non_null(result.clone())));
            }
        }

        let reply: BackendReply =
            serde_json::from_value(raw.clone()).map_err(|e| MalformedReply(e.to_string()))?;
        if reply.has_error {
            return Ok(ReplyOutcome::Failed(
                reply.error_message.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        let data = match reply.data {
            None | Some(JsonValue::Null) => return Ok(ReplyOutcome::Result(None)),
            Some(JsonValue::String(s)) => {
                serde_json::from_str::<JsonValue>(&s).map_err(|e| MalformedReply(format!("data: {}", e)))?
            }
            Some(other) => other,
        };
        match data {
            JsonValue::Object(mut map) => Ok(ReplyOutcome::Result(map.remove("Result").and_then(non_null))),
            _ => Err(MalformedReply("data must be an object holding Result".to_string())),
        }
    }
}

fn non_null(v: JsonValue) -> Option<JsonValue> {
    (!v.is_null()).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_string_encoded_data() {
        let bytes = serde_json::to_vec(&json!({
            "hasError": false,
            "data": "{\"Result\": {\"id\": 42}}"
        }))
        .unwrap();
        assert_eq!(
            BackendReply::decode(&bytes).unwrap(),
            ReplyOutcome::Result(Some(json!({"id": 42})))
        );
    }

    #[test]
    fn decodes_object_data_and_bare_result() {
        let bytes = BackendReply::success(json!([1, 2])).to_bytes();
        assert_eq!(BackendReply::decode(&bytes).unwrap(), ReplyOutcome::Result(Some(json!([1, 2]))));

        let bare = br#"{"Result": {"id": 1}}"#;
        assert_eq!(BackendReply::decode(bare).unwrap(), ReplyOutcome::Result(Some(json!({"id": 1}))));
    }

    #[test]
    fn decodes_failure() {
        let bytes = BackendReply::failure("duplicate key").to_bytes();
        assert_eq!(
            BackendReply::decode(&bytes).unwrap(),
            ReplyOutcome::Failed("duplicate key".into())
        );
    }

    #[test]
    fn missing_result_is_not_an_error_here() {
        assert_eq!(
            BackendReply::decode(br#"{"hasError": false, "data": {}}"#).unwrap(),
            ReplyOutcome::Result(None)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(BackendReply::decode(b"not json").is_err());
        assert!(BackendReply::decode(br#"{"hasError": false, "data": 7}"#).is_err());
    }

    #[test]
    fn request_accessors() {
        let req = BackendRequest {
            args: vec![
                "execute".into(),
                "tools".into(),
                "create_widget".into(),
                "tok".into(),
                "{\"name\":\"Acme\"}".into(),
            ],
            body: String::new(),
            channel: String::new(),
            timeout: 600,
        };
        assert_eq!(req.verb(), Some("execute"));
        assert_eq!(req.target(), Some("create_widget"));
        assert_eq!(req.payload(), Some(json!({"name": "Acme"})));
    }
}
