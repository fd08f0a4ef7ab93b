//! API handlers for the Courier HTTP interface.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::dispatch::{DispatchOutcome, DispatchService};
use crate::subscription::Subscription;
use crate::web::dto::{
    ApiResponse, DispatchResponse, EmailRequest, MailRequest, TokenRequest, ValidatedJson,
};
use crate::web::error::ApiError;

/// Shared application state.
pub struct AppState {
    /// Dispatch service.
    pub service: DispatchService,
}

impl AppState {
    pub fn new(service: DispatchService) -> Self {
        Self { service }
    }
}

/// POST /api/mail/queue - Queue a mail for background delivery.
pub async fn queue_mail(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<MailRequest>,
) -> Result<(StatusCode, Json<DispatchResponse>), ApiError> {
    let request = payload.into();
    match state.service.queue(&request).await? {
        DispatchOutcome::Queued { id, subject } => Ok((
            StatusCode::ACCEPTED,
            Json(DispatchResponse::queued(id, subject)),
        )),
        DispatchOutcome::NoRecipients => {
            Ok((StatusCode::OK, Json(DispatchResponse::no_recipients())))
        }
        DispatchOutcome::Delivered(_) => Err(ApiError::internal("Unexpected dispatch outcome")),
    }
}

/// POST /api/mail/send - Deliver a mail immediately, bypassing the queue.
pub async fn send_mail(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<MailRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let request = payload.into();
    match state.service.send(&request).await? {
        DispatchOutcome::Delivered(info) => Ok(Json(DispatchResponse::delivered(info.subject))),
        DispatchOutcome::NoRecipients => Ok(Json(DispatchResponse::no_recipients())),
        DispatchOutcome::Queued { .. } => Err(ApiError::internal("Unexpected dispatch outcome")),
    }
}

/// POST /api/subscriptions/block-email - Block an address.
pub async fn block_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> Result<Json<ApiResponse<Subscription>>, ApiError> {
    let sub = state.service.block_email(&payload.email).await?;
    Ok(Json(ApiResponse::new(sub)))
}

/// POST /api/subscriptions/unblock-email - Unblock an address.
pub async fn unblock_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> Result<Json<ApiResponse<Subscription>>, ApiError> {
    let sub = state.service.unblock_email(&payload.email).await?;
    Ok(Json(ApiResponse::new(sub)))
}

/// POST /api/subscriptions/block-token - Block by opt-out token.
pub async fn block_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<TokenRequest>,
) -> Result<Json<ApiResponse<Subscription>>, ApiError> {
    let sub = state.service.block_token(&payload.token).await?;
    Ok(Json(ApiResponse::new(sub)))
}

/// POST /api/subscriptions/unblock-token - Unblock by opt-out token.
pub async fn unblock_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<TokenRequest>,
) -> Result<Json<ApiResponse<Subscription>>, ApiError> {
    let sub = state.service.unblock_token(&payload.token).await?;
    Ok(Json(ApiResponse::new(sub)))
}
