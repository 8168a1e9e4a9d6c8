//! Server-side dispatcher.
//!
//! Takes one envelope plus the caller's bearer token, routes it to a backend
//! call and normalizes the backend reply into a [`DispatchResponse`]:
//!
//! 1. token presence (and optionally expiry) -> 401
//! 2. envelope parse -> 400
//! 3. planning: envelope -> positional bus args (400 / 404 / 501)
//! 4. one bus request under a hard timeout (503)
//! 5. reply normalization (404 / 503 / 504)
//!
//! Requests are independent; the only shared state is the read-only registry.
//!
//! The caller identity used for `###UPN###` is taken from unverified token
//! claims. Run splice mode only behind a gateway that verifies tokens.

use crate::domain::envelope::{
    self, ActionOperation, CrudOperation, Envelope, Operation, QueryOperation, SUBJECT_CREATE, SUBJECT_DELETE,
    SUBJECT_PATCH, SUBJECT_READ, SUBJECT_RESTORE, SUBJECT_UNDO_DELETE, SUBJECT_UPDATE,
};
use crate::domain::identity::CallerIdentity;
use crate::domain::{DataAccessError, DispatchResponse, Registry, Substitution, ValidationError};
use crate::infra::bus::{BackendReply, BackendRequest, MessageBus, ReplyOutcome};
use crate::infra::config::{DispatcherConfig, SubstitutionMode};
use chrono::Utc;
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;
use tracing::Instrument;

/// Channel name carried in every bus request.
const REQUEST_CHANNEL: &str = "x";

/// What a successful reply must contain for the call to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyExpectation {
    /// Exactly one row (`read`). No rows is not-found; several is a protocol error.
    SingleRow,
    /// A `Result` must be present (`query`).
    Rows,
    /// Whatever came back, `null` when nothing did (mutations and actions).
    Any,
}

/// A routed envelope: bus args plus how to interpret the reply.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    pub args: Vec<String>,
    pub expect: ReplyExpectation,
}

impl BackendCall {
    fn execute(database: &str, function: String, token: &str, payload: &JsonValue) -> Self {
        Self {
            args: vec![
                "execute".to_string(),
                database.to_string(),
                function,
                token.to_string(),
                payload.to_string(),
            ],
            expect: ReplyExpectation::Any,
        }
    }

    fn query(database: &str, sql: String, expect: ReplyExpectation) -> Self {
        Self {
            args: vec!["query".to_string(), database.to_string(), sql],
            expect,
        }
    }

    /// Function name for `execute` calls, query text for `query` calls.
    pub fn target(&self) -> &str {
        self.args.get(2).map(String::as_str).unwrap_or_default()
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    bus: Arc<dyn MessageBus>,
    config: DispatcherConfig,
    substitution: Substitution,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, bus: Arc<dyn MessageBus>, config: DispatcherConfig) -> Self {
        let substitution = Substitution::new(config.positional_capacity);
        Self {
            registry,
            bus,
            config,
            substitution,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handles an undecoded envelope, as received over HTTP.
    pub async fn dispatch_raw(&self, raw: &JsonValue, token: Option<&str>) -> DispatchResponse {
        let span = tracing::info_span!(
            "dispatch",
            subject = tracing::field::Empty,
            message_type = tracing::field::Empty
        );
        let result = self.handle_raw(raw, token).instrument(span).await;
        respond(result)
    }

    /// Handles an already decoded envelope.
    pub async fn dispatch(&self, envelope: Envelope, token: Option<&str>) -> DispatchResponse {
        let span = tracing::info_span!(
            "dispatch",
            subject = tracing::field::Empty,
            message_type = tracing::field::Empty
        );
        let result = self.handle(envelope, token).instrument(span).await;
        respond(result)
    }

    async fn handle_raw(&self, raw: &JsonValue, token: Option<&str>) -> Result<JsonValue, DataAccessError> {
        let (token, identity) = self.authenticate(token)?;
        let envelope = envelope::parse(raw)?;
        self.run(envelope, token, &identity).await
    }

    async fn handle(&self, envelope: Envelope, token: Option<&str>) -> Result<JsonValue, DataAccessError> {
        let (token, identity) = self.authenticate(token)?;
        envelope.validate()?;
        self.run(envelope, token, &identity).await
    }

    async fn run(
        &self,
        envelope: Envelope,
        token: &str,
        identity: &CallerIdentity,
    ) -> Result<JsonValue, DataAccessError> {
        let span = tracing::Span::current();
        span.record("subject", envelope.subject.as_str());
        span.record("message_type", envelope.message.message_type());

        let call = self.plan(&envelope, token, identity)?;
        tracing::debug!(target_name = call.target(), "routed");
        let outcome = self.call_backend(&call).await?;
        normalize(call.expect, outcome)
    }

    fn authenticate<'t>(&self, token: Option<&'t str>) -> Result<(&'t str, CallerIdentity), DataAccessError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DataAccessError::Unauthenticated("missing bearer token".to_string()))?;
        let identity = CallerIdentity::from_bearer(token);
        if self.config.reject_expired_tokens && identity.is_expired_at(Utc::now()) {
            return Err(DataAccessError::Unauthenticated("bearer token has expired".to_string()));
        }
        Ok((token, identity))
    }

    /// Routes an envelope to its backend call without touching the bus.
    pub fn plan(
        &self,
        envelope: &Envelope,
        token: &str,
        identity: &CallerIdentity,
    ) -> Result<BackendCall, DataAccessError> {
        match &envelope.message {
            Operation::CrudOperation(op) => plan_crud(&envelope.subject, op, token),
            Operation::Query(op) => self.plan_query(op, identity),
            Operation::Action(op) => self.plan_action(op, token),
        }
    }

    fn plan_query(&self, op: &QueryOperation, identity: &CallerIdentity) -> Result<BackendCall, DataAccessError> {
        let view = self.registry.get_view(&op.name)?;
        let params = op.parameters.as_deref().unwrap_or_default();
        if params.len() > self.substitution.capacity() {
            tracing::debug!(
                given = params.len(),
                capacity = self.substitution.capacity(),
                "extra positional parameters dropped"
            );
        }

        let template_error = |e: crate::domain::substitution::SubstitutionError| {
            DataAccessError::Internal(format!("view '{}': {}", op.name, e))
        };
        match self.config.substitution_mode {
            SubstitutionMode::Splice => {
                let sql = self
                    .substitution
                    .substitute(&view.sql_template, identity.upn(), params)
                    .map_err(template_error)?;
                Ok(BackendCall::query(&view.database_name, sql, ReplyExpectation::Rows))
            }
            SubstitutionMode::Bind => {
                let bound = self
                    .substitution
                    .bind(&view.sql_template, identity.upn(), params)
                    .map_err(template_error)?;
                let mut call = BackendCall::query(&view.database_name, bound.sql, ReplyExpectation::Rows);
                call.args.push(json!(bound.params).to_string());
                Ok(call)
            }
        }
    }

    fn plan_action(&self, op: &ActionOperation, token: &str) -> Result<BackendCall, DataAccessError> {
        let action = self.registry.get_action(&op.name)?;
        let payload = JsonValue::Object(op.parameters.clone().unwrap_or_default());
        Ok(BackendCall::execute(
            &action.database_name,
            action.function_name.clone(),
            token,
            &payload,
        ))
    }

    async fn call_backend(&self, call: &BackendCall) -> Result<ReplyOutcome, DataAccessError> {
        let timeout = self.config.backend_timeout;
        let request = BackendRequest {
            args: call.args.clone(),
            body: String::new(),
            channel: REQUEST_CHANNEL.to_string(),
            timeout: timeout.as_secs(),
        };
        let payload = serde_json::to_vec(&request).map_err(|e| DataAccessError::Internal(e.to_string()))?;

        let subject = self.config.backend_subject.as_str();
        let bytes = match tokio::time::timeout(timeout, self.bus.request(subject, payload)).await {
            Err(_) => {
                tracing::warn!(subject, ?timeout, "backend did not reply in time");
                return Err(DataAccessError::BackendTimeout(format!(
                    "no reply from '{}' within {:?}",
                    subject, timeout
                )));
            }
            Ok(Err(e)) => {
                tracing::warn!(subject, error = %e, "bus request failed");
                return Err(DataAccessError::Transport(e.to_string()));
            }
            Ok(Ok(bytes)) => bytes,
        };

        BackendReply::decode(&bytes).map_err(|e| DataAccessError::Protocol(e.to_string()))
    }
}

fn plan_crud(subject: &str, op: &CrudOperation, token: &str) -> Result<BackendCall, DataAccessError> {
    let target = &op.target_database;
    let table = target.table_name.as_str();
    let database = target.database_name.as_str();

    match subject {
        SUBJECT_PATCH | SUBJECT_UNDO_DELETE => {
            return Err(DataAccessError::NotImplemented(format!(
                "'{}' has no backend mapping",
                subject
            )))
        }
        SUBJECT_CREATE | SUBJECT_READ | SUBJECT_UPDATE | SUBJECT_DELETE | SUBJECT_RESTORE => {}
        other => {
            return Err(ValidationError::single("subject", format!("unknown CRUD subject '{}'", other)).into());
        }
    }

    if !validate_ident(table) {
        return Err(
            ValidationError::single("message.targetDatabase.tableName", "must be a plain SQL identifier").into(),
        );
    }

    let function = format!("{}_{}", subject, table);
    let call = match subject {
        SUBJECT_READ => {
            let id = require_id(op)?;
            BackendCall::query(
                database,
                format!("select * from {} where id = {}", table, id),
                ReplyExpectation::SingleRow,
            )
        }
        SUBJECT_CREATE => {
            let data = require_data(op)?;
            BackendCall::execute(database, function, token, &JsonValue::Object(data.clone()))
        }
        SUBJECT_UPDATE => {
            let (id, data) = (require_id(op)?, require_data(op)?);
            let mut payload = data.clone();
            payload.insert("id".to_string(), JsonValue::from(id));
            BackendCall::execute(database, function, token, &JsonValue::Object(payload))
        }
        SUBJECT_DELETE => {
            let id = require_id(op)?;
            let hard = op.record.hard_delete.unwrap_or(false);
            BackendCall::execute(database, function, token, &json!({ "id": id, "hard": hard }))
        }
        // restore
        _ => {
            let id = require_id(op)?;
            BackendCall::execute(database, function, token, &json!({ "id": id }))
        }
    };
    Ok(call)
}

fn require_id(op: &CrudOperation) -> Result<i64, DataAccessError> {
    op.record
        .id
        .ok_or_else(|| ValidationError::single("message.record.id", "is required").into())
}

fn require_data(op: &CrudOperation) -> Result<&Map<String, JsonValue>, DataAccessError> {
    op.record
        .data
        .as_ref()
        .ok_or_else(|| ValidationError::single("message.record.data", "is required").into())
}

/// True for plain SQL identifiers: a letter or `_` followed by alphanumerics or `_`.
pub fn validate_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn normalize(expect: ReplyExpectation, outcome: ReplyOutcome) -> Result<JsonValue, DataAccessError> {
    let result = match outcome {
        ReplyOutcome::Failed(message) => return Err(DataAccessError::Backend(message)),
        ReplyOutcome::Result(result) => result,
    };

    match expect {
        ReplyExpectation::Any => Ok(result.unwrap_or(JsonValue::Null)),
        ReplyExpectation::Rows => {
            result.ok_or_else(|| DataAccessError::Protocol("No error signalled, but empty result returned".to_string()))
        }
        ReplyExpectation::SingleRow => match result {
            None => Err(DataAccessError::NotFound("Item not found".to_string())),
            Some(JsonValue::Array(mut rows)) => match rows.len() {
                0 => Err(DataAccessError::NotFound("Item not found".to_string())),
                1 => Ok(rows.remove(0)),
                n => Err(DataAccessError::Protocol(format!("expected exactly one row, got {}", n))),
            },
            Some(other) => Err(DataAccessError::Protocol(format!(
                "expected a row array, got {}",
                json_type_name(&other)
            ))),
        },
    }
}

fn json_type_name(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn respond(result: Result<JsonValue, DataAccessError>) -> DispatchResponse {
    match &result {
        Ok(_) => tracing::info!(status = 200, "dispatched"),
        Err(e) if e.status() >= 500 => tracing::error!(status = e.status(), error = %e, "dispatch failed"),
        Err(e) => tracing::warn!(status = e.status(), error = %e, "dispatch rejected"),
    }
    DispatchResponse::from_result(result)
}
