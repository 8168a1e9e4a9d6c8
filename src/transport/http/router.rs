use crate::domain::error::{ErrorKind, ValidationIssue};
use crate::domain::{DispatchResponse, Envelope};
use crate::transport::http::handlers::{health, registry, translate};
use crate::transport::http::types::{AppState, HealthResponse, RegistryEntry};
use axum::routing::{get, post};
use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        translate::translate_handler,
        registry::list_views_handler,
        registry::get_view_handler,
        registry::list_actions_handler,
        registry::get_action_handler
    ),
    components(schemas(Envelope, DispatchResponse, ErrorKind, ValidationIssue, HealthResponse, RegistryEntry)),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/translate", post(translate::translate_handler))
        .route("/api/registry/views", get(registry::list_views_handler))
        .route("/api/registry/views/:name", get(registry::get_view_handler))
        .route("/api/registry/actions", get(registry::list_actions_handler))
        .route("/api/registry/actions/:name", get(registry::get_action_handler))
        .with_state(app_state)
}
