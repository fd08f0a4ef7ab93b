//! HTTP interface for Courier.
//!
//! A thin axum layer over the dispatch service: mail submission, blacklist
//! management and a health check. Request bodies are validated before they
//! reach the pipeline; pipeline errors map onto a stable JSON error shape.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;

pub use error::{ApiError, ErrorCode};
pub use handlers::AppState;
pub use router::create_router;
