//! Request and response DTOs for the Courier HTTP interface.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidateEmail, ValidationError};

use crate::dispatch::SendRequest;
use crate::web::error::ApiError;

/// A JSON extractor that validates the request body.
///
/// Deserializes the request body as JSON and then validates it using the
/// `validator` crate. If validation fails, a detailed error response with
/// field-level error information is returned.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

/// Validate that every entry of an address list is a well-formed email.
fn email_list(values: &[String]) -> Result<(), ValidationError> {
    for value in values {
        if !value.validate_email() {
            return Err(ValidationError::new("email_list")
                .with_message(format!("'{value}' is not a valid email address").into()));
        }
    }
    Ok(())
}

/// Mail submission request, shared by the queue and send endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct MailRequest {
    /// Primary recipients.
    #[validate(
        length(min = 1, message = "At least one recipient is required"),
        custom(function = email_list)
    )]
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    #[serde(default)]
    #[validate(custom(function = email_list))]
    pub cc: Vec<String>,
    /// Blind-carbon-copy recipients.
    #[serde(default)]
    #[validate(custom(function = email_list))]
    pub bcc: Vec<String>,
    /// Sender address.
    #[validate(email(message = "Sender must be a valid email address"))]
    pub from: String,
    /// Subject template source.
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    /// Name of a registered file-based template.
    #[serde(default)]
    pub template: Option<String>,
    /// Inline plain-text body template.
    #[serde(default)]
    pub text: Option<String>,
    /// Inline HTML body template.
    #[serde(default)]
    pub html: Option<String>,
    /// Inline markdown body template.
    #[serde(default)]
    pub markdown: Option<String>,
    /// Open mapping of template values.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl From<MailRequest> for SendRequest {
    fn from(req: MailRequest) -> Self {
        SendRequest {
            to: req.to,
            cc: req.cc,
            bcc: req.bcc,
            from: req.from,
            subject: req.subject,
            template: req.template,
            text: req.text,
            html: req.html,
            markdown: req.markdown,
            data: req.data,
        }
    }
}

/// Block or unblock by address.
#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    /// Subscription address.
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
}

/// Block or unblock by opt-out token.
#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    /// Opt-out token.
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Outcome body for the mail endpoints.
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    /// One of `queued`, `no_recipients`, `delivered`.
    pub status: &'static str,
    /// Queue item id (queued only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Rendered subject (queued and delivered).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl DispatchResponse {
    pub fn queued(id: String, subject: String) -> Self {
        Self {
            status: "queued",
            id: Some(id),
            subject: Some(subject),
        }
    }

    pub fn no_recipients() -> Self {
        Self {
            status: "no_recipients",
            id: None,
            subject: None,
        }
    }

    pub fn delivered(subject: String) -> Self {
        Self {
            status: "delivered",
            id: None,
            subject: Some(subject),
        }
    }
}
