//! Router configuration for the Courier HTTP interface.

use axum::{
    http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    block_email, block_token, queue_mail, send_mail, unblock_email, unblock_token, AppState,
};

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let mail_routes = Router::new()
        .route("/queue", post(queue_mail))
        .route("/send", post(send_mail));

    let subscription_routes = Router::new()
        .route("/block-email", post(block_email))
        .route("/unblock-email", post(unblock_email))
        .route("/block-token", post(block_token))
        .route("/unblock-token", post(unblock_token));

    let api_routes = Router::new()
        .nest("/mail", mail_routes)
        .nest("/subscriptions", subscription_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(app_state)
}

/// Create a CORS layer from configuration.
///
/// Without configured origins any origin is allowed, without credentials.
/// With origins, only those origins are allowed.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    let parsed_origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_origin(Any)
    } else {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
            .allow_origin(parsed_origins)
    }
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer_empty_origins() {
        let _layer = create_cors_layer(&[]);
    }

    #[test]
    fn test_create_cors_layer_with_origins() {
        let origins = vec!["http://localhost:3000".to_string()];
        let _layer = create_cors_layer(&origins);
    }
}
