//! Courier - Transactional Mail Dispatch Service
//!
//! A small HTTP service that resolves recipients against a subscription
//! store, renders templated mail and delivers it over SMTP, either
//! immediately or through a durable retry queue.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod queue;
pub mod subscription;
pub mod template;
pub mod transport;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use dispatch::{DispatchOutcome, DispatchService, MailTask, SendRequest};
pub use error::{CourierError, Result};
pub use queue::{start_queue_poller, MailQueueRepository, QueuePoller};
pub use subscription::{Subscription, SubscriptionRepository};
pub use template::{BodyKind, Renderer, TemplateRegistry};
pub use transport::{DeliveryInfo, SmtpMailer, StubMailer, Transport};
