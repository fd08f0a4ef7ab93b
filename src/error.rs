//! Error types for Courier.

use thiserror::Error;

/// Common error type for Courier.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Database error.
    ///
    /// Generic database error wrapping failures from the store backend.
    /// Errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error (template file loading, log files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for a malformed request, rejected before the
    /// pipeline runs.
    #[error("validation error: {0}")]
    Validation(String),

    /// A named template is not registered in the configuration.
    #[error("no template '{0}' registered in courier config")]
    UnknownTemplate(String),

    /// The request carries neither a template name nor an inline body.
    #[error("no message body found")]
    EmptyBody,

    /// Template rendering failed (malformed template syntax).
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// Mail transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Resource not found (token-selector miss on block/unblock).
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for CourierError {
    fn from(e: sqlx::Error) -> Self {
        CourierError::Database(e.to_string())
    }
}

/// Result type alias for Courier operations.
pub type Result<T> = std::result::Result<T, CourierError>;
