//! Reply shapes: the dispatcher's HTTP response body and the normalized result
//! a transport hands back to the facade.

use crate::domain::error::{DataAccessError, ErrorKind, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Body of every dispatcher response. `status` is duplicated as the HTTP status.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<ValidationIssue>>,
}

impl DispatchResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            status: 200,
            data: Some(data),
            error: None,
            error_kind: None,
            issues: None,
        }
    }

    pub fn from_error(err: &DataAccessError) -> Self {
        let issues = match err {
            DataAccessError::Validation(v) => Some(v.issues.clone()),
            _ => None,
        };
        Self {
            status: err.status(),
            data: None,
            error: Some(err.detail()),
            error_kind: Some(err.kind()),
            issues,
        }
    }

    pub fn from_result(result: Result<JsonValue, DataAccessError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Normalizes into the transport-level result shape.
    pub fn into_result_envelope(self) -> ResultEnvelope {
        if self.is_success() {
            return ResultEnvelope::success(self.data.unwrap_or(JsonValue::Null));
        }
        let kind = self.error_kind.unwrap_or_else(|| ErrorKind::from_status(self.status));
        let message = self.error.unwrap_or_else(|| format!("request failed with status {}", self.status));
        ResultEnvelope {
            has_error: true,
            error_message: Some(message),
            data: None,
            error_kind: Some(kind),
            issues: self.issues,
        }
    }
}

/// What a transport returns for a call that completed.
///
/// `has_error == true` implies `data` is absent; `has_error == false` implies
/// `data` is present (possibly `null`). Use the constructors to keep that.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub has_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<ValidationIssue>>,
}

impl ResultEnvelope {
    pub fn success(data: JsonValue) -> Self {
        Self {
            has_error: false,
            error_message: None,
            data: Some(data),
            error_kind: None,
            issues: None,
        }
    }

    pub fn failure(err: &DataAccessError) -> Self {
        DispatchResponse::from_error(err).into_result_envelope()
    }

    pub fn into_result(self) -> Result<JsonValue, DataAccessError> {
        if !self.has_error {
            return Ok(self.data.unwrap_or(JsonValue::Null));
        }
        let kind = self.error_kind.unwrap_or(ErrorKind::Backend);
        let message = self.error_message.unwrap_or_else(|| "Unknown error".to_string());
        Err(DataAccessError::from_wire(kind, message, self.issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ValidationError;
    use serde_json::json;

    #[test]
    fn success_carries_data_and_no_error() {
        let env = DispatchResponse::ok(json!({"id": 42})).into_result_envelope();
        assert!(!env.has_error);
        assert_eq!(env.data, Some(json!({"id": 42})));
        assert_eq!(env.into_result().unwrap(), json!({"id": 42}));
    }

    #[test]
    fn empty_success_still_has_data() {
        let env = DispatchResponse::ok(JsonValue::Null).into_result_envelope();
        assert!(env.data.is_some());
    }

    #[test]
    fn failure_has_no_data_and_keeps_kind() {
        let err = DataAccessError::BackendTimeout("no reply within 600s".into());
        let body = DispatchResponse::from_error(&err);
        assert_eq!(body.status, 503);
        let env = body.into_result_envelope();
        assert!(env.has_error && env.data.is_none());
        assert!(matches!(env.into_result(), Err(DataAccessError::BackendTimeout(_))));
    }

    #[test]
    fn status_without_kind_is_mapped() {
        let body: DispatchResponse = serde_json::from_value(json!({"status": 404, "error": "Item not found"})).unwrap();
        assert!(matches!(
            body.into_result_envelope().into_result(),
            Err(DataAccessError::NotFound(m)) if m == "Item not found"
        ));
    }

    #[test]
    fn validation_issues_survive_the_wire() {
        let err = DataAccessError::Validation(ValidationError::single("message.name", "is required"));
        let wire = serde_json::to_value(DispatchResponse::from_error(&err)).unwrap();
        assert_eq!(wire["errorKind"], json!("validation"));
        let back: DispatchResponse = serde_json::from_value(wire).unwrap();
        match back.into_result_envelope().into_result() {
            Err(DataAccessError::Validation(v)) => assert!(v.has_path("message.name")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
