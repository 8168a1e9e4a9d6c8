use crate::app::dispatcher::Dispatcher;
use crate::domain::{DataAccessError, DispatchResponse, Registry, ValidationError};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let registry = dispatcher.registry().clone();
        Self { dispatcher, registry }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Registered views.
    pub views: usize,
    /// Registered actions.
    pub actions: usize,
    /// Registered tables.
    pub tables: usize,
}

/// One registry entry as exposed to tooling.
#[derive(Serialize, Debug, ToSchema)]
pub struct RegistryEntry {
    pub name: String,
    #[schema(value_type = Object)]
    pub definition: JsonValue,
}

impl RegistryEntry {
    pub fn new<D: Serialize>(name: &str, definition: &D) -> Self {
        Self {
            name: name.to_string(),
            definition: serde_json::to_value(definition).unwrap_or(JsonValue::Null),
        }
    }
}

/// Maps a dispatcher response onto the HTTP status it carries.
pub fn http_status(resp: &DispatchResponse) -> StatusCode {
    StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn error_reply(err: &DataAccessError) -> (StatusCode, Json<DispatchResponse>) {
    let body = DispatchResponse::from_error(err);
    (http_status(&body), Json(body))
}

pub fn json_400(err: JsonRejection, expected: &str) -> (StatusCode, Json<DispatchResponse>) {
    let err = DataAccessError::Validation(ValidationError::single(
        "",
        format!("Invalid JSON body: {} (expected: {})", err.body_text(), expected),
    ));
    error_reply(&err)
}
