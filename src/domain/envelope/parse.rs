use super::Envelope;
use crate::domain::error::ValidationError;
use serde_json::{Map, Value as JsonValue};

const MESSAGE_TYPES: &[&str] = &["crudOperation", "query", "action"];

/// Parses a raw JSON document into an [`Envelope`].
///
/// Structural checks run first and collect every failing path; only a document
/// that passes them is handed to serde. Unknown `messageType` values are
/// rejected.
pub fn parse(raw: &JsonValue) -> Result<Envelope, ValidationError> {
    let mut errors = ValidationError::new();

    let root = match raw.as_object() {
        Some(o) => o,
        None => return Err(ValidationError::single("", "envelope must be a JSON object")),
    };

    expect_string(root, "subject", "subject", &mut errors);

    match root.get("message") {
        None => errors.push("message", "is required"),
        Some(JsonValue::Object(message)) => check_message(message, &mut errors),
        Some(_) => errors.push("message", "expected object"),
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let envelope: Envelope = serde_json::from_value(raw.clone())
        .map_err(|e| ValidationError::single("", format!("envelope could not be decoded: {}", e)))?;
    envelope.validate()?;
    Ok(envelope)
}

fn check_message(message: &Map<String, JsonValue>, errors: &mut ValidationError) {
    let message_type = match message.get("messageType") {
        None => {
            errors.push("message.messageType", "is required");
            return;
        }
        Some(JsonValue::String(s)) => s.as_str(),
        Some(_) => {
            errors.push("message.messageType", "expected string");
            return;
        }
    };

    match message_type {
        "crudOperation" => check_crud(message, errors),
        "query" => {
            expect_string(message, "name", "message.name", errors);
            if let Some(params) = present(message, "parameters") {
                match params.as_array() {
                    Some(items) => {
                        for (i, item) in items.iter().enumerate() {
                            if !item.is_string() {
                                errors.push(format!("message.parameters.{}", i), "expected string");
                            }
                        }
                    }
                    None => errors.push("message.parameters", "expected array of strings"),
                }
            }
        }
        "action" => {
            expect_string(message, "name", "message.name", errors);
            if let Some(params) = present(message, "parameters") {
                if !params.is_object() {
                    errors.push("message.parameters", "expected object");
                }
            }
        }
        other => errors.push(
            "message.messageType",
            format!("unknown message type '{}' (expected one of: {})", other, MESSAGE_TYPES.join(", ")),
        ),
    }
}

fn check_crud(message: &Map<String, JsonValue>, errors: &mut ValidationError) {
    match message.get("targetDatabase") {
        None => errors.push("message.targetDatabase", "is required"),
        Some(JsonValue::Object(target)) => {
            expect_string(target, "databaseName", "message.targetDatabase.databaseName", errors);
            expect_string(target, "tableName", "message.targetDatabase.tableName", errors);
            match target.get("isVirtual") {
                None => errors.push("message.targetDatabase.isVirtual", "is required"),
                Some(v) if !v.is_boolean() => {
                    errors.push("message.targetDatabase.isVirtual", "expected boolean")
                }
                Some(_) => {}
            }
        }
        Some(_) => errors.push("message.targetDatabase", "expected object"),
    }

    match message.get("record") {
        None => errors.push("message.record", "is required"),
        Some(JsonValue::Object(record)) => {
            if let Some(id) = present(record, "id") {
                if id.as_i64().is_none() {
                    errors.push("message.record.id", "expected integer");
                }
            }
            if let Some(data) = present(record, "data") {
                if !data.is_object() {
                    errors.push("message.record.data", "expected object");
                }
            }
            if let Some(hard) = present(record, "hardDelete") {
                if !hard.is_boolean() {
                    errors.push("message.record.hardDelete", "expected boolean");
                }
            }
        }
        Some(_) => errors.push("message.record", "expected object"),
    }
}

/// Optional fields: absent and explicit null are treated alike.
fn present<'a>(obj: &'a Map<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => None,
        Some(v) => Some(v),
    }
}

fn expect_string(obj: &Map<String, JsonValue>, key: &str, path: &str, errors: &mut ValidationError) {
    match obj.get(key) {
        None => errors.push(path, "is required"),
        Some(v) if !v.is_string() => errors.push(path, "expected string"),
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::envelope::Operation;
    use serde_json::json;

    #[test]
    fn parses_each_variant() {
        let crud = parse(&json!({
            "subject": "read",
            "message": {
                "messageType": "crudOperation",
                "targetDatabase": {"databaseName": "tools", "tableName": "country", "isVirtual": false},
                "record": {"id": 7}
            }
        }))
        .unwrap();
        assert!(matches!(crud.message, Operation::CrudOperation(ref op) if op.record.id == Some(7)));

        let query = parse(&json!({
            "subject": "query",
            "message": {"messageType": "query", "name": "tools", "parameters": ["a", "b"]}
        }))
        .unwrap();
        assert!(matches!(query.message, Operation::Query(ref q) if q.parameters.as_ref().unwrap().len() == 2));

        let action = parse(&json!({
            "subject": "execute",
            "message": {"messageType": "action", "name": "tools", "parameters": {"id": 1}}
        }))
        .unwrap();
        assert!(matches!(action.message, Operation::Action(_)));
    }

    #[test]
    fn unknown_message_types_are_rejected() {
        for kind in ["insert", "CRUDOPERATION", "", "queries", "batch"] {
            let err = parse(&json!({
                "subject": "x",
                "message": {"messageType": kind, "name": "tools"}
            }))
            .unwrap_err();
            assert!(err.has_path("message.messageType"), "{kind}: {err}");
        }
    }

    #[test]
    fn collects_every_failing_path() {
        let err = parse(&json!({
            "subject": 12,
            "message": {
                "messageType": "crudOperation",
                "targetDatabase": {"tableName": 3, "isVirtual": "no"},
                "record": {"id": "seven", "data": []}
            }
        }))
        .unwrap_err();
        for path in [
            "subject",
            "message.targetDatabase.databaseName",
            "message.targetDatabase.tableName",
            "message.targetDatabase.isVirtual",
            "message.record.id",
            "message.record.data",
        ] {
            assert!(err.has_path(path), "missing {path} in {err}");
        }
    }

    #[test]
    fn fields_of_other_variants_are_ignored() {
        let env = parse(&json!({
            "subject": "query",
            "message": {
                "messageType": "query",
                "name": "countries",
                "targetDatabase": "not even an object",
                "record": 42
            }
        }))
        .unwrap();
        assert_eq!(env, crate::domain::envelope::Envelope::query("countries", None));
    }

    #[test]
    fn every_registry_entry_round_trips() {
        use crate::domain::envelope::Envelope;
        use crate::domain::registry::catalog;

        let registry = catalog::builtin();
        for (name, _) in registry.views() {
            let env = Envelope::query(name, Some(vec!["a".into(), "it's".into()]));
            assert_eq!(parse(&env.to_json()), Ok(env.clone()), "view {name}");
            let bare = Envelope::query(name, None);
            assert_eq!(parse(&bare.to_json()), Ok(bare), "view {name}");
        }
        for (name, _) in registry.actions() {
            let mut params = serde_json::Map::new();
            params.insert("id".into(), json!(1));
            params.insert("tags".into(), json!(["x", "y"]));
            let env = Envelope::action(name, Some(params));
            assert_eq!(parse(&env.to_json()), Ok(env), "action {name}");
        }
    }

    #[test]
    fn non_object_roots_fail_cleanly() {
        assert!(parse(&json!("create")).is_err());
        assert!(parse(&json!({"subject": "create"})).unwrap_err().has_path("message"));
    }
}
