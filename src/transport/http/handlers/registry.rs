use crate::domain::DataAccessError;
use crate::transport::http::types::{error_reply, AppState, RegistryEntry};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/api/registry/views",
    responses((status = 200, description = "All registered views", body = Vec<RegistryEntry>))
)]
pub async fn list_views_handler(State(state): State<AppState>) -> impl IntoResponse {
    let entries: Vec<RegistryEntry> = state
        .registry
        .views()
        .map(|(name, view)| RegistryEntry::new(name, view))
        .collect();
    Json(entries)
}

#[utoipa::path(
    get,
    path = "/api/registry/views/{name}",
    params(("name" = String, Path, description = "View name")),
    responses(
        (status = 200, description = "View definition", body = RegistryEntry),
        (status = 404, description = "No such view", body = DispatchResponse)
    )
)]
pub async fn get_view_handler(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    match state.registry.get_view(&name) {
        Ok(view) => Json(RegistryEntry::new(&name, view)).into_response(),
        Err(e) => error_reply(&DataAccessError::from(e)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/registry/actions",
    responses((status = 200, description = "All registered actions", body = Vec<RegistryEntry>))
)]
pub async fn list_actions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let entries: Vec<RegistryEntry> = state
        .registry
        .actions()
        .map(|(name, action)| RegistryEntry::new(name, action))
        .collect();
    Json(entries)
}

#[utoipa::path(
    get,
    path = "/api/registry/actions/{name}",
    params(("name" = String, Path, description = "Action name")),
    responses(
        (status = 200, description = "Action definition", body = RegistryEntry),
        (status = 404, description = "No such action", body = DispatchResponse)
    )
)]
pub async fn get_action_handler(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    match state.registry.get_action(&name) {
        Ok(action) => Json(RegistryEntry::new(&name, action)).into_response(),
        Err(e) => error_reply(&DataAccessError::from(e)).into_response(),
    }
}
