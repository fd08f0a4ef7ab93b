//! Test helpers for Courier API tests.

use std::sync::Arc;

use axum_test::TestServer;

use courier::dispatch::DispatchService;
use courier::template::{Renderer, TemplateRegistry};
use courier::transport::{StubMailer, Transport};
use courier::web::{create_router, AppState};
use courier::Database;

/// Create a test server with an in-memory database and a recording stub
/// transport.
pub async fn create_test_server() -> (TestServer, Database, Arc<StubMailer>) {
    create_test_server_with_templates(TemplateRegistry::empty()).await
}

/// Create a test server with a specific template registry.
pub async fn create_test_server_with_templates(
    registry: TemplateRegistry,
) -> (TestServer, Database, Arc<StubMailer>) {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");

    let stub = Arc::new(StubMailer::new());
    let service = DispatchService::new(
        db.clone(),
        registry,
        Renderer::new(),
        stub.clone() as Arc<dyn Transport>,
    );

    let state = Arc::new(AppState::new(service));
    let router = create_router(state, &[]);

    let server = TestServer::new(router).expect("Failed to create test server");

    (server, db, stub)
}
