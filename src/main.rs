use std::sync::Arc;

use tracing::info;

use courier::dispatch::DispatchService;
use courier::template::{Renderer, TemplateRegistry};
use courier::web::{create_router, AppState};
use courier::{transport, Config, Database};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = courier::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        courier::logging::init_console_only(&config.logging.level);
    }

    info!("Courier - Transactional Mail Dispatch Service");

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database {}: {}", config.database.path, e);
            return std::process::ExitCode::FAILURE;
        }
    };

    let mailer = match transport::from_config(&config.transport) {
        Ok(mailer) => mailer,
        Err(e) => {
            tracing::error!("Failed to configure transport: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    let registry = TemplateRegistry::from_config(config.templates.clone());
    let service = DispatchService::new(db.clone(), registry, Renderer::new(), mailer.clone());

    // Background delivery of queued mail
    courier::start_queue_poller(db.clone(), mailer, &config.queue);

    let state = Arc::new(AppState::new(service));
    let router = create_router(state, &config.server.cors_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return std::process::ExitCode::FAILURE;
        }
    };

    info!("Listening on {}", addr);
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!("Server error: {}", e);
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}
