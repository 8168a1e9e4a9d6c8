//! Registry mapping view, action and table names to their definitions.
//!
//! A registry is built once at startup (from the built-in catalog or a JSON
//! document), wrapped in an `Arc`, and only read afterwards. It is passed to
//! the dispatcher and the facade explicitly.

use crate::domain::shape::Shape;
use crate::domain::substitution::Substitution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub mod catalog;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("invalid registry document: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named, parameterized read query with a declared output shape.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub database_name: String,
    /// Query template; may contain `###UPN###` and `###P<n>###` placeholders.
    pub sql_template: String,
    #[serde(default)]
    pub schema: Shape,
    /// Documentation of the positional parameters, in slot order.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

/// A named remote callable on the backend executor.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub database_name: String,
    pub function_name: String,
    #[serde(default)]
    pub input_schema: Shape,
    #[serde(default)]
    pub output_schema: Shape,
}

/// A table the facade can address with CRUD operations.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub database_name: String,
    pub table_name: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub shape: Shape,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Registry {
    #[serde(default)]
    views: BTreeMap<String, ViewDefinition>,
    #[serde(default)]
    actions: BTreeMap<String, ActionDefinition>,
    #[serde(default)]
    tables: BTreeMap<String, TableDefinition>,
}

impl Registry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the view called `name`.
    pub fn register_view(&mut self, name: &str, view: ViewDefinition) {
        self.views.insert(name.to_string(), view);
    }

    /// Adds or replaces the action called `name`.
    pub fn register_action(&mut self, name: &str, action: ActionDefinition) {
        self.actions.insert(name.to_string(), action);
    }

    /// Adds or replaces a table, keyed by its table name.
    pub fn register_table(&mut self, table: TableDefinition) {
        self.tables.insert(table.table_name.clone(), table);
    }

    /// Looks up a view by name.
    pub fn get_view(&self, name: &str) -> Result<&ViewDefinition, RegistryError> {
        self.views.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: "view",
            name: name.to_string(),
        })
    }

    /// Looks up an action by name.
    pub fn get_action(&self, name: &str) -> Result<&ActionDefinition, RegistryError> {
        self.actions.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: "action",
            name: name.to_string(),
        })
    }

    /// Looks up a table by name.
    pub fn get_table(&self, name: &str) -> Result<&TableDefinition, RegistryError> {
        self.tables.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: "table",
            name: name.to_string(),
        })
    }

    /// All registered views, in name order.
    pub fn views(&self) -> impl Iterator<Item = (&String, &ViewDefinition)> {
        self.views.iter()
    }

    /// All registered actions, in name order.
    pub fn actions(&self) -> impl Iterator<Item = (&String, &ActionDefinition)> {
        self.actions.iter()
    }

    /// All registered tables, in name order.
    pub fn tables(&self) -> impl Iterator<Item = (&String, &TableDefinition)> {
        self.tables.iter()
    }

    /// Number of (views, actions, tables).
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.views.len(), self.actions.len(), self.tables.len())
    }

    /// Checks that every view template can be resolved with the given substitution capacity.
    pub fn check_templates(&self, substitution: &Substitution) -> Result<(), RegistryError> {
        for (name, view) in &self.views {
            substitution
                .check_template(&view.sql_template)
                .map_err(|e| RegistryError::Invalid(format!("view '{}': {}", name, e)))?;
        }
        Ok(())
    }

    /// Loads a registry document: `{ "views": {..}, "actions": {..}, "tables": {..} }`.
    pub fn from_json_str(doc: &str, substitution: &Substitution) -> Result<Self, RegistryError> {
        let reg: Registry = serde_json::from_str(doc).map_err(|e| RegistryError::Invalid(e.to_string()))?;
        reg.check_templates(substitution)?;
        Ok(reg)
    }

    /// Reads a registry document from disk; see [`Registry::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>, substitution: &Substitution) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let doc = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Invalid(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&doc, substitution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookups_share_one_not_found_policy() {
        let reg = Registry::new();
        assert_eq!(
            reg.get_view("nope").unwrap_err(),
            RegistryError::NotFound { kind: "view", name: "nope".into() }
        );
        assert!(matches!(reg.get_action("nope"), Err(RegistryError::NotFound { kind: "action", .. })));
        assert!(matches!(reg.get_table("nope"), Err(RegistryError::NotFound { kind: "table", .. })));
    }

    #[test]
    fn lookups_are_exact() {
        let reg = catalog::builtin();
        assert!(reg.get_view("tools").is_ok());
        assert!(reg.get_view("Tools").is_err());
        assert!(reg.get_view("tool").is_err());
    }

    #[test]
    fn loads_document_and_rejects_unresolvable_templates() {
        let doc = json!({
            "views": {
                "by_owner": {
                    "databaseName": "tools",
                    "sqlTemplate": "select * from tool where owner = '###UPN###' and id = ###P1###",
                    "schema": {"fields": [{"name": "id", "kind": "integer"}]}
                }
            },
            "actions": {
                "touch": {"databaseName": "tools", "functionName": "touch_tool"}
            }
        })
        .to_string();
        let reg = Registry::from_json_str(&doc, &Substitution::default()).unwrap();
        assert_eq!(reg.get_action("touch").unwrap().function_name, "touch_tool");
        assert_eq!(reg.counts(), (1, 1, 0));

        let err = Registry::from_json_str(&doc, &Substitution::new(0)).unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));
    }

    #[test]
    fn builtin_catalog_templates_resolve() {
        catalog::builtin().check_templates(&Substitution::default()).unwrap();
    }
}
