//! Declarative record shapes used to validate data before it is sent and
//! replies after they are received.

use crate::domain::error::ValidationError;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// RFC 3339 timestamp carried as a string.
    Timestamp,
    Object,
    Array,
    Any,
}

impl FieldKind {
    fn describe(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "RFC3339 timestamp",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Any => "any value",
        }
    }

    fn accepts(&self, v: &JsonValue) -> bool {
        match self {
            FieldKind::String => v.is_string(),
            FieldKind::Integer => v.is_i64() || v.is_u64(),
            FieldKind::Number => v.is_number(),
            FieldKind::Boolean => v.is_boolean(),
            FieldKind::Timestamp => v
                .as_str()
                .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
            FieldKind::Object => v.is_object(),
            FieldKind::Array => v.is_array(),
            FieldKind::Any => true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            optional: false,
            nullable: false,
            description: None,
        }
    }

    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            optional: true,
            ..Self::required(name, kind)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

fn default_allow_unknown() -> bool {
    true
}

/// Shape of a JSON object: the fields it declares and whether others may appear.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default = "default_allow_unknown")]
    pub allow_unknown: bool,
}

impl Default for Shape {
    fn default() -> Self {
        Self::any()
    }
}

impl Shape {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            allow_unknown: true,
        }
    }

    /// Accepts any object.
    pub fn any() -> Self {
        Self::new(Vec::new())
    }

    pub fn strict(mut self) -> Self {
        self.allow_unknown = false;
        self
    }

    /// Appends fields, replacing any existing field of the same name.
    pub fn extend(mut self, fields: Vec<FieldSpec>) -> Self {
        for f in fields {
            self.fields.retain(|existing| existing.name != f.name);
            self.fields.push(f);
        }
        self
    }

    /// True when every JSON value is acceptable, objects or not.
    pub fn is_open(&self) -> bool {
        self.fields.is_empty() && self.allow_unknown
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates a complete record.
    pub fn validate(&self, value: &JsonValue) -> Result<(), ValidationError> {
        self.check(value, "", true)
    }

    /// Validates a partial record: declared fields are type-checked when present,
    /// but none is required.
    pub fn validate_partial(&self, value: &JsonValue) -> Result<(), ValidationError> {
        self.check(value, "", false)
    }

    /// Same as [`Shape::validate`], reporting paths below `prefix`.
    pub fn validate_at(&self, value: &JsonValue, prefix: &str) -> Result<(), ValidationError> {
        self.check(value, prefix, true)
    }

    fn check(&self, value: &JsonValue, prefix: &str, require: bool) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        let obj = match value.as_object() {
            Some(o) => o,
            None => {
                errors.push(prefix, "expected object");
                return Err(errors);
            }
        };

        for spec in &self.fields {
            let path = join_path(prefix, &spec.name);
            match obj.get(&spec.name) {
                None => {
                    if require && !spec.optional {
                        errors.push(path, "is required");
                    }
                }
                Some(JsonValue::Null) => {
                    // An optional field may be sent as explicit null.
                    if !spec.nullable && !spec.optional {
                        errors.push(path, "must not be null");
                    }
                }
                Some(v) => {
                    if !spec.kind.accepts(v) {
                        errors.push(path, format!("expected {}", spec.kind.describe()));
                    }
                }
            }
        }

        if !self.allow_unknown {
            for key in obj.keys() {
                if self.field(key).is_none() {
                    errors.push(join_path(prefix, key), "is not a declared field");
                }
            }
        }

        errors.into_result()
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn country() -> Shape {
        Shape::new(vec![
            FieldSpec::required("name", FieldKind::String),
            FieldSpec::required("region_id", FieldKind::Integer),
            FieldSpec::optional("description", FieldKind::String).nullable(),
            FieldSpec::optional("created_at", FieldKind::Timestamp),
        ])
    }

    #[test]
    fn accepts_matching_record() {
        let shape = country();
        shape
            .validate(&json!({"name": "Denmark", "region_id": 1, "description": null, "extra": true}))
            .unwrap();
    }

    #[test]
    fn reports_all_issues_at_once() {
        let err = country()
            .validate(&json!({"region_id": "one", "created_at": "yesterday"}))
            .unwrap_err();
        assert_eq!(err.issues.len(), 3);
        assert!(err.has_path("name"));
        assert!(err.has_path("region_id"));
        assert!(err.has_path("created_at"));
    }

    #[test]
    fn partial_skips_required_fields() {
        let shape = country();
        shape.validate_partial(&json!({"description": "Nordic"})).unwrap();
        let err = shape.validate_partial(&json!({"region_id": 1.5})).unwrap_err();
        assert!(err.has_path("region_id"));
    }

    #[test]
    fn strict_shape_rejects_unknown_fields() {
        let shape = Shape::new(vec![FieldSpec::required("id", FieldKind::Integer)]).strict();
        let err = shape.validate(&json!({"id": 1, "comments": "x"})).unwrap_err();
        assert!(err.has_path("comments"));
    }

    #[test]
    fn non_object_is_rejected_with_prefix() {
        let err = Shape::any().validate_at(&json!([1, 2]), "record.data").unwrap_err();
        assert!(err.has_path("record.data"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let shape: Shape = serde_json::from_value(json!({
            "fields": [{"name": "id", "kind": "integer"}]
        }))
        .unwrap();
        assert!(shape.allow_unknown);
        assert!(!shape.fields[0].optional);
    }
}
