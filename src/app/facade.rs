//! Typed client API over the envelope protocol.
//!
//! Every operation builds exactly one envelope, validates what it can locally
//! (before any network call), sends it through a [`Transport`] with a fresh
//! token, and checks the reply against the declared shapes. A reply that does
//! not match is a protocol error, never a partially-populated success.

use crate::app::token::TokenProvider;
use crate::domain::envelope::{
    Envelope, RecordRef, TargetDatabase, SUBJECT_CREATE, SUBJECT_DELETE, SUBJECT_PATCH, SUBJECT_READ,
    SUBJECT_RESTORE, SUBJECT_UPDATE,
};
use crate::domain::{DataAccessError, Registry, Shape, TableDefinition, ValidationError};
use crate::transport::client::Transport;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::marker::PhantomData;
use std::sync::Arc;

/// Reply of a successful `create`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CreatedRecord {
    pub id: i64,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Clone)]
pub struct DataClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    registry: Arc<Registry>,
}

impl DataClient {
    /// Client that fetches a fresh token from `tokens` for every envelope it sends.
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenProvider>, registry: Arc<Registry>) -> Self {
        Self {
            transport,
            tokens,
            registry,
        }
    }

    /// Registry used for local validation.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Typed handle on a registered table.
    pub fn table<T>(&self, name: &str) -> Result<Table<T>, DataAccessError>
    where
        T: Serialize + DeserializeOwned,
    {
        let definition = self.registry.get_table(name)?.clone();
        Ok(Table {
            client: self.clone(),
            definition,
            _record: PhantomData,
        })
    }

    /// Runs a registered view without positional parameters.
    pub async fn query(&self, view: &str) -> Result<Vec<JsonValue>, DataAccessError> {
        self.query_with(view, Vec::new()).await
    }

    /// Runs a registered view; `params` fill `###P1###`, `###P2###`, ... in order.
    pub async fn query_with(&self, view: &str, params: Vec<String>) -> Result<Vec<JsonValue>, DataAccessError> {
        let definition = self.registry.get_view(view)?;
        let parameters = (!params.is_empty()).then_some(params);
        let data = self.send(Envelope::query(view, parameters)).await?;

        let rows = match data {
            JsonValue::Array(rows) => rows,
            other => {
                return Err(DataAccessError::Protocol(format!(
                    "view '{}' returned {} instead of rows",
                    view,
                    if other.is_object() { "an object" } else { "a scalar" }
                )))
            }
        };
        if !definition.schema.is_open() {
            let mut issues = ValidationError::new();
            for (i, row) in rows.iter().enumerate() {
                if let Err(e) = definition.schema.validate_at(row, &format!("[{}]", i)) {
                    issues.extend(e);
                }
            }
            issues
                .into_result()
                .map_err(|e| DataAccessError::Protocol(format!("view '{}' rows: {}", view, e)))?;
        }
        Ok(rows)
    }

    /// Like [`DataClient::query_with`], deserializing every row into `R`.
    pub async fn query_as<R: DeserializeOwned>(
        &self,
        view: &str,
        params: Vec<String>,
    ) -> Result<Vec<R>, DataAccessError> {
        self.query_with(view, params)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DataAccessError::Protocol(e.to_string())))
            .collect()
    }

    /// Calls a registered action. Unknown actions fail before anything is sent.
    pub async fn execute(&self, action: &str, parameters: Map<String, JsonValue>) -> Result<JsonValue, DataAccessError> {
        let definition = self.registry.get_action(action)?;
        if !definition.input_schema.is_open() {
            definition
                .input_schema
                .validate(&JsonValue::Object(parameters.clone()))?;
        }

        let result = self.send(Envelope::action(action, Some(parameters))).await?;

        if !definition.output_schema.is_open() {
            definition
                .output_schema
                .validate(&result)
                .map_err(|e| DataAccessError::Protocol(format!("action '{}' result: {}", action, e)))?;
        }
        Ok(result)
    }

    async fn send(&self, envelope: Envelope) -> Result<JsonValue, DataAccessError> {
        envelope.validate()?;
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| DataAccessError::Unauthenticated(e.to_string()))?;
        tracing::debug!(subject = %envelope.subject, kind = envelope.message.message_type(), "sending envelope");
        self.transport.send(&envelope, &token).await?.into_result()
    }
}

/// CRUD access to one table, with records typed as `T`.
pub struct Table<T> {
    client: DataClient,
    definition: TableDefinition,
    _record: PhantomData<fn() -> T>,
}

impl<T> Table<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Backend table name.
    pub fn name(&self) -> &str {
        &self.definition.table_name
    }

    /// Shape records are checked against, in both directions.
    pub fn shape(&self) -> &Shape {
        &self.definition.shape
    }

    /// Inserts `record` and returns the id assigned by the backend.
    pub async fn create(&self, record: &T) -> Result<i64, DataAccessError> {
        let data = to_object(record)?;
        self.definition.shape.validate(&JsonValue::Object(data.clone()))?;
        let reply = self
            .send(
                SUBJECT_CREATE,
                RecordRef {
                    data: Some(data),
                    ..Default::default()
                },
            )
            .await?;
        let created: CreatedRecord = serde_json::from_value(reply).map_err(|e| {
            DataAccessError::Protocol(format!("create on '{}' did not return {{id, comments?}}: {}", self.name(), e))
        })?;
        Ok(created.id)
    }

    /// Fetches one record by id. A missing row is `NotFound`.
    pub async fn read(&self, id: i64) -> Result<T, DataAccessError> {
        let reply = self.send(SUBJECT_READ, with_id(id)).await?;
        self.decode(reply)
    }

    /// Replaces the record at `id` and returns it as stored.
    pub async fn update(&self, id: i64, record: &T) -> Result<T, DataAccessError> {
        let data = to_object(record)?;
        self.definition.shape.validate(&JsonValue::Object(data.clone()))?;
        let reply = self
            .send(
                SUBJECT_UPDATE,
                RecordRef {
                    id: Some(id),
                    data: Some(data),
                    ..Default::default()
                },
            )
            .await?;
        self.decode(reply)
    }

    /// Updates only the given fields. Declared fields are type-checked; none is required.
    pub async fn patch(&self, id: i64, changes: Map<String, JsonValue>) -> Result<(), DataAccessError> {
        self.definition
            .shape
            .validate_partial(&JsonValue::Object(changes.clone()))?;
        self.send(
            SUBJECT_PATCH,
            RecordRef {
                id: Some(id),
                data: Some(changes),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    /// Soft delete unless `hard_delete`; the backend decides what either means.
    pub async fn delete(&self, id: i64, hard_delete: bool) -> Result<(), DataAccessError> {
        self.send(
            SUBJECT_DELETE,
            RecordRef {
                id: Some(id),
                hard_delete: Some(hard_delete),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    /// Undoes a soft delete and returns the restored record.
    pub async fn restore(&self, id: i64) -> Result<T, DataAccessError> {
        let reply = self.send(SUBJECT_RESTORE, with_id(id)).await?;
        self.decode(reply)
    }

    pub async fn query(&self, view: &str) -> Result<Vec<JsonValue>, DataAccessError> {
        self.client.query(view).await
    }

    pub async fn execute(&self, action: &str, parameters: Map<String, JsonValue>) -> Result<JsonValue, DataAccessError> {
        self.client.execute(action, parameters).await
    }

    fn target(&self) -> TargetDatabase {
        TargetDatabase {
            database_name: self.definition.database_name.clone(),
            table_name: self.definition.table_name.clone(),
            is_virtual: self.definition.is_virtual,
        }
    }

    async fn send(&self, subject: &str, record: RecordRef) -> Result<JsonValue, DataAccessError> {
        self.client.send(Envelope::crud(subject, self.target(), record)).await
    }

    fn decode(&self, reply: JsonValue) -> Result<T, DataAccessError> {
        self.definition
            .shape
            .validate(&reply)
            .map_err(|e| DataAccessError::Protocol(format!("record from '{}': {}", self.name(), e)))?;
        serde_json::from_value(reply).map_err(|e| DataAccessError::Protocol(e.to_string()))
    }
}

fn with_id(id: i64) -> RecordRef {
    RecordRef {
        id: Some(id),
        ..Default::default()
    }
}

fn to_object<T: Serialize>(record: &T) -> Result<Map<String, JsonValue>, DataAccessError> {
    match serde_json::to_value(record) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::single("", "record must serialize to an object").into()),
        Err(e) => Err(ValidationError::single("", e.to_string()).into()),
    }
}
