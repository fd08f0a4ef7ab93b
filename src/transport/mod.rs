//! Mail transport for Courier.
//!
//! The dispatch pipeline and queue poller talk to a `Transport` trait
//! object; implementations cover real SMTP delivery via lettre, hand-off
//! to an HTTP sending API, and a recording stub for tests and dry runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use pulldown_cmark::{html, Parser};
use serde::Serialize;
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::dispatch::MailTask;
use crate::template::BodyKind;
use crate::{CourierError, Result};

/// Delivery acknowledgment returned by a transport.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryInfo {
    /// Message id assigned at hand-off.
    pub message_id: String,
    /// Rendered subject of the delivered task.
    pub subject: String,
}

/// Async mail transport abstraction.
///
/// A timeout is reported like any other transport failure; retry policy
/// belongs to the caller (the queue poller retries, direct send does not).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a built task.
    async fn send(&self, task: &MailTask) -> Result<DeliveryInfo>;
}

/// SMTP transport over lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build an SMTP mailer from configuration.
    pub fn from_config(config: &crate::config::SmtpConfig) -> Result<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| CourierError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }

    fn build_message(task: &MailTask) -> Result<Message> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&task.from)?)
            .subject(&task.subject);

        for addr in split_addresses(&task.to) {
            builder = builder.to(parse_mailbox(addr)?);
        }
        for addr in split_addresses(&task.cc) {
            builder = builder.cc(parse_mailbox(addr)?);
        }
        for addr in split_addresses(&task.bcc) {
            builder = builder.bcc(parse_mailbox(addr)?);
        }

        let (kind, body) = task
            .body()
            .ok_or_else(|| CourierError::Transport("task has no body".to_string()))?;

        // Markdown goes out as multipart/alternative: the raw markdown as
        // the plain part, the converted HTML for capable clients.
        match kind {
            BodyKind::Markdown => builder.multipart(MultiPart::alternative_plain_html(
                body.to_string(),
                markdown_to_html(body),
            )),
            BodyKind::Html => builder
                .header(ContentType::TEXT_HTML)
                .body(body.to_string()),
            BodyKind::Text => builder
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string()),
        }
        .map_err(|e| CourierError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Transport for SmtpMailer {
    async fn send(&self, task: &MailTask) -> Result<DeliveryInfo> {
        let message = Self::build_message(task)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| CourierError::Transport(e.to_string()))?;

        Ok(DeliveryInfo {
            message_id: Uuid::new_v4().to_string(),
            subject: task.subject.clone(),
        })
    }
}

fn split_addresses(joined: &str) -> impl Iterator<Item = &str> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse::<Mailbox>()
        .map_err(|e| CourierError::Transport(format!("invalid address '{addr}': {e}")))
}

fn markdown_to_html(markdown: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new(markdown));
    out
}

/// HTTP API transport.
///
/// Posts the task as JSON to a provider's send endpoint with bearer
/// authentication. Any non-2xx response counts as a delivery failure.
pub struct ApiMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ApiMailer {
    /// Build an API mailer from configuration.
    pub fn from_config(config: &crate::config::ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Transport for ApiMailer {
    async fn send(&self, task: &MailTask) -> Result<DeliveryInfo> {
        let mut request = self.client.post(&self.endpoint).json(task);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CourierError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CourierError::Transport(format!(
                "send endpoint returned {}",
                response.status()
            )));
        }

        Ok(DeliveryInfo {
            message_id: Uuid::new_v4().to_string(),
            subject: task.subject.clone(),
        })
    }
}

/// Recording stub transport for tests.
///
/// Stores every delivered task and can be told to fail a number of
/// deliveries before succeeding again.
#[derive(Default)]
pub struct StubMailer {
    sent: Mutex<Vec<MailTask>>,
    fail_remaining: AtomicU32,
}

impl StubMailer {
    /// Create a new stub mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` deliveries.
    pub fn fail_next(&self, count: u32) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Tasks delivered so far.
    pub fn sent(&self) -> Vec<MailTask> {
        self.sent.lock().expect("stub mailer lock poisoned").clone()
    }
}

#[async_trait]
impl Transport for StubMailer {
    async fn send(&self, task: &MailTask) -> Result<DeliveryInfo> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(CourierError::Transport("stub failure".to_string()));
        }

        self.sent
            .lock()
            .expect("stub mailer lock poisoned")
            .push(task.clone());

        Ok(DeliveryInfo {
            message_id: Uuid::new_v4().to_string(),
            subject: task.subject.clone(),
        })
    }
}

/// Build the configured transport.
pub fn from_config(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    match config.kind.as_str() {
        "smtp" => Ok(Arc::new(SmtpMailer::from_config(&config.smtp)?)),
        "api" => Ok(Arc::new(ApiMailer::from_config(&config.api)?)),
        "stub" => Ok(Arc::new(StubMailer::new())),
        other => Err(CourierError::Config(format!(
            "unknown transport type '{other}'"
        ))),
    }
}
