//! The envelope: the unit of communication between the facade and the dispatcher.
//!
//! ```json
//! { "subject": "create",
//!   "message": { "messageType": "crudOperation",
//!                "targetDatabase": { "databaseName": "tools", "tableName": "widget", "isVirtual": false },
//!                "record": { "data": { "name": "Acme" } } } }
//! ```
//!
//! `messageType` selects the variant; fields belonging to other variants are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

mod parse;

pub use parse::parse;

use crate::domain::error::ValidationError;

/// CRUD subjects with a backend mapping.
pub const SUBJECT_CREATE: &str = "create";
pub const SUBJECT_READ: &str = "read";
pub const SUBJECT_UPDATE: &str = "update";
pub const SUBJECT_DELETE: &str = "delete";
pub const SUBJECT_RESTORE: &str = "restore";
/// Reserved CRUD subjects, recognised but not mapped to a backend function.
pub const SUBJECT_PATCH: &str = "patch";
pub const SUBJECT_UNDO_DELETE: &str = "undo_delete";
pub const SUBJECT_QUERY: &str = "query";
pub const SUBJECT_EXECUTE: &str = "execute";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Envelope {
    /// Short verb used for routing and logging (`create`, `query`, ...).
    pub subject: String,
    #[schema(value_type = Object)]
    pub message: Operation,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum Operation {
    CrudOperation(CrudOperation),
    Query(QueryOperation),
    Action(ActionOperation),
}

impl Operation {
    pub fn message_type(&self) -> &'static str {
        match self {
            Operation::CrudOperation(_) => "crudOperation",
            Operation::Query(_) => "query",
            Operation::Action(_) => "action",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrudOperation {
    pub target_database: TargetDatabase,
    pub record: RecordRef,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetDatabase {
    pub database_name: String,
    pub table_name: String,
    pub is_virtual: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_delete: Option<bool>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct QueryOperation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ActionOperation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, JsonValue>>,
}

impl Envelope {
    pub fn crud(subject: &str, target: TargetDatabase, record: RecordRef) -> Self {
        Self {
            subject: subject.to_string(),
            message: Operation::CrudOperation(CrudOperation {
                target_database: target,
                record,
            }),
        }
    }

    pub fn query(name: &str, parameters: Option<Vec<String>>) -> Self {
        Self {
            subject: SUBJECT_QUERY.to_string(),
            message: Operation::Query(QueryOperation {
                name: name.to_string(),
                parameters,
            }),
        }
    }

    pub fn action(name: &str, parameters: Option<Map<String, JsonValue>>) -> Self {
        Self {
            subject: SUBJECT_EXECUTE.to_string(),
            message: Operation::Action(ActionOperation {
                name: name.to_string(),
                parameters,
            }),
        }
    }

    /// Semantic checks that the type system cannot express. Applied to parsed
    /// envelopes and to locally constructed ones before they are sent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if self.subject.trim().is_empty() {
            errors.push("subject", "must not be empty");
        }
        match &self.message {
            Operation::CrudOperation(op) => {
                if op.target_database.database_name.trim().is_empty() {
                    errors.push("message.targetDatabase.databaseName", "must not be empty");
                }
                if op.target_database.table_name.trim().is_empty() {
                    errors.push("message.targetDatabase.tableName", "must not be empty");
                }
            }
            Operation::Query(QueryOperation { name, .. }) | Operation::Action(ActionOperation { name, .. }) => {
                if name.trim().is_empty() {
                    errors.push("message.name", "must not be empty");
                }
            }
        }
        errors.into_result()
    }

    pub fn to_json(&self) -> JsonValue {
        // Serialization of these types cannot fail: all keys are strings.
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_wire_shape() {
        let mut data = Map::new();
        data.insert("name".into(), json!("Acme"));
        let env = Envelope::crud(
            SUBJECT_CREATE,
            TargetDatabase {
                database_name: "tools".into(),
                table_name: "widget".into(),
                is_virtual: false,
            },
            RecordRef {
                data: Some(data),
                ..Default::default()
            },
        );
        assert_eq!(
            env.to_json(),
            json!({
                "subject": "create",
                "message": {
                    "messageType": "crudOperation",
                    "targetDatabase": {"databaseName": "tools", "tableName": "widget", "isVirtual": false},
                    "record": {"data": {"name": "Acme"}}
                }
            })
        );
    }

    #[test]
    fn semantic_validation_flags_empty_names() {
        let env = Envelope::query("  ", None);
        let err = env.validate().unwrap_err();
        assert!(err.has_path("message.name"));
    }
}
