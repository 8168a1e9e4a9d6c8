// src/bin/api_server.rs

use message_data_layer::domain::registry::catalog;
use message_data_layer::infra::config;
use message_data_layer::transport;
use message_data_layer::{Dispatcher, DispatcherConfig, NatsBus, Registry};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- Configuration ---
    let dispatcher_config = DispatcherConfig::from_env()?;
    let bus_url = config::bus_url()?;
    let substitution = message_data_layer::domain::Substitution::new(dispatcher_config.positional_capacity);

    // --- Registry Initialization ---
    let registry = match config::registry_path() {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading registry document");
            Registry::from_json_file(&path, &substitution)?
        }
        None => {
            let reg = catalog::builtin();
            reg.check_templates(&substitution)?;
            reg
        }
    };
    let (views, actions, tables) = registry.counts();
    tracing::info!(views, actions, tables, "registry ready");

    // --- Dispatcher Initialization ---
    let bus = Arc::new(NatsBus::new(bus_url));
    tracing::info!(
        subject = %dispatcher_config.backend_subject,
        timeout = ?dispatcher_config.backend_timeout,
        mode = ?dispatcher_config.substitution_mode,
        "dispatcher configured"
    );
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), bus, dispatcher_config));
    let app_state = transport::http::AppState::new(dispatcher);

    // --- API Server Initialization ---
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let bind_addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("API server listening on http://{}", bind_addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", bind_addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
