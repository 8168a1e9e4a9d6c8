#![allow(dead_code)]

use message_data_layer::domain::registry::catalog;
use message_data_layer::domain::{FieldKind, FieldSpec, Shape, TableDefinition};
use message_data_layer::infra::bus::{BackendExecutor, MemoryBus};
use message_data_layer::{transport, Dispatcher, DispatcherConfig, Registry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Widget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
}

/// Built-in catalog plus a `widget` table in the `tools` database.
pub fn registry() -> Arc<Registry> {
    let mut reg = catalog::builtin();
    reg.register_table(TableDefinition {
        database_name: "tools".into(),
        table_name: "widget".into(),
        is_virtual: false,
        shape: Shape::new(vec![FieldSpec::required("name", FieldKind::String)]),
    });
    Arc::new(reg)
}

pub struct TestServer {
    pub base_url: String,
    pub bus: MemoryBus,
    pub dispatcher: Arc<Dispatcher>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts the dispatcher router on an ephemeral port, backed by `executor`.
pub async fn spawn_server(executor: impl BackendExecutor + 'static, config: DispatcherConfig) -> TestServer {
    let bus = MemoryBus::new(executor);
    let dispatcher = Arc::new(Dispatcher::new(registry(), Arc::new(bus.clone()), config));
    let router = transport::http::create_router(transport::http::AppState::new(dispatcher.clone()));

    // Bind to an ephemeral port to avoid conflicts if a dispatcher is already running.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        bus,
        dispatcher,
        handle,
    }
}
