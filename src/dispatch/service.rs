//! Dispatch service wiring the pipeline stages together.

use std::sync::Arc;

use tracing::info;

use crate::db::Database;
use crate::queue::MailQueueRepository;
use crate::subscription::{Subscription, SubscriptionRepository};
use crate::template::{Renderer, TemplateRegistry};
use crate::transport::Transport;
use crate::Result;

use super::builder::build_task;
use super::resolver::resolve;
use super::types::{DispatchOutcome, SendRequest};

/// The dispatch pipeline: recipient resolution, blacklist filtering,
/// template rendering and either queueing or immediate delivery.
#[derive(Clone)]
pub struct DispatchService {
    db: Database,
    registry: Arc<TemplateRegistry>,
    renderer: Arc<Renderer>,
    transport: Arc<dyn Transport>,
}

impl DispatchService {
    pub fn new(
        db: Database,
        registry: TemplateRegistry,
        renderer: Renderer,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            db,
            registry: Arc::new(registry),
            renderer: Arc::new(renderer),
            transport,
        }
    }

    /// Run the pipeline and persist the resulting task for background
    /// delivery.
    pub async fn queue(&self, request: &SendRequest) -> Result<DispatchOutcome> {
        let subs = SubscriptionRepository::new(self.db.pool());
        let resolved = resolve(&subs, request).await?;

        let Some(task) = build_task(request, &resolved, &self.registry, &self.renderer).await?
        else {
            return Ok(DispatchOutcome::NoRecipients);
        };

        let queue = MailQueueRepository::new(self.db.pool());
        let subject = task.subject.clone();
        let id = queue.enqueue(&task).await?;
        info!("Queued mail {} (subject: {})", id, subject);

        Ok(DispatchOutcome::Queued { id, subject })
    }

    /// Run the pipeline and deliver the task immediately, bypassing the
    /// queue. Transport failures surface as errors.
    pub async fn send(&self, request: &SendRequest) -> Result<DispatchOutcome> {
        let subs = SubscriptionRepository::new(self.db.pool());
        let resolved = resolve(&subs, request).await?;

        let Some(task) = build_task(request, &resolved, &self.registry, &self.renderer).await?
        else {
            return Ok(DispatchOutcome::NoRecipients);
        };

        let info = self.transport.send(&task).await?;
        info!(
            "Sent mail {} (subject: {})",
            info.message_id, info.subject
        );

        Ok(DispatchOutcome::Delivered(info))
    }

    /// Block an address. Creates the subscription if it does not exist.
    pub async fn block_email(&self, email: &str) -> Result<Subscription> {
        let subs = SubscriptionRepository::new(self.db.pool());
        subs.set_blocked_by_email(email, true).await
    }

    /// Unblock an address. Creates the subscription if it does not exist.
    pub async fn unblock_email(&self, email: &str) -> Result<Subscription> {
        let subs = SubscriptionRepository::new(self.db.pool());
        subs.set_blocked_by_email(email, false).await
    }

    /// Block the subscription identified by an opt-out token.
    pub async fn block_token(&self, token: &str) -> Result<Subscription> {
        let subs = SubscriptionRepository::new(self.db.pool());
        subs.set_blocked_by_token(token, true).await
    }

    /// Unblock the subscription identified by an opt-out token.
    pub async fn unblock_token(&self, token: &str) -> Result<Subscription> {
        let subs = SubscriptionRepository::new(self.db.pool());
        subs.set_blocked_by_token(token, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StubMailer;
    use crate::CourierError;
    use serde_json::json;

    async fn service() -> (DispatchService, Arc<StubMailer>, Database) {
        let db = Database::open_in_memory().await.unwrap();
        let stub = Arc::new(StubMailer::new());
        let service = DispatchService::new(
            db.clone(),
            TemplateRegistry::empty(),
            Renderer::new(),
            stub.clone() as Arc<dyn Transport>,
        );
        (service, stub, db)
    }

    fn request(to: &[&str]) -> SendRequest {
        let mut request: SendRequest = serde_json::from_value(json!({
            "to": [],
            "from": "bev@example.com",
            "subject": "Test email {{number}}",
            "text": "Hello {{number}}",
            "data": { "number": 123 }
        }))
        .unwrap();
        request.to = to.iter().map(|s| s.to_string()).collect();
        request
    }

    #[tokio::test]
    async fn test_queue_returns_id_and_rendered_subject() {
        let (service, _stub, db) = service().await;

        let outcome = service.queue(&request(&["mel@example.com"])).await.unwrap();
        match outcome {
            DispatchOutcome::Queued { id, subject } => {
                assert_eq!(subject, "Test email 123");
                let queue = MailQueueRepository::new(db.pool());
                assert!(queue.get_by_id(&id).await.unwrap().is_some());
            }
            other => panic!("expected Queued, got {:?}", other),
        }

        // Resolution registered the new address as unblocked
        let subs = SubscriptionRepository::new(db.pool());
        let sub = subs
            .get_by_email("mel@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(!sub.is_blocked());
    }

    #[tokio::test]
    async fn test_queue_blocked_recipient_is_no_op() {
        let (service, _stub, db) = service().await;

        service.block_email("mel@example.com").await.unwrap();
        let outcome = service.queue(&request(&["mel@example.com"])).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::NoRecipients));

        let queue = MailQueueRepository::new(db.pool());
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_delivers_immediately() {
        let (service, stub, db) = service().await;

        let outcome = service.send(&request(&["mel@example.com"])).await.unwrap();
        match outcome {
            DispatchOutcome::Delivered(info) => {
                assert_eq!(info.subject, "Test email 123");
            }
            other => panic!("expected Delivered, got {:?}", other),
        }

        let sent = stub.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "mel@example.com");
        assert_eq!(sent[0].text.as_deref(), Some("Hello 123"));

        // Immediate sends never touch the queue
        let queue = MailQueueRepository::new(db.pool());
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_transport_failure_surfaces() {
        let (service, stub, _db) = service().await;

        stub.fail_next(1);
        let err = service
            .send(&request(&["mel@example.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Transport(_)));
    }

    #[tokio::test]
    async fn test_block_then_unblock_email() {
        let (service, _stub, _db) = service().await;

        let sub = service.block_email("mel@example.com").await.unwrap();
        assert!(sub.is_blocked());

        let sub = service.unblock_email("mel@example.com").await.unwrap();
        assert!(!sub.is_blocked());
    }

    #[tokio::test]
    async fn test_block_token_unknown_is_not_found() {
        let (service, _stub, _db) = service().await;

        let err = service.block_token("no-such-token").await.unwrap_err();
        assert!(matches!(err, CourierError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unblock_token_uses_resolution_token() {
        let (service, _stub, db) = service().await;

        service.block_email("mel@example.com").await.unwrap();
        let subs = SubscriptionRepository::new(db.pool());
        let token = subs
            .get_by_email("mel@example.com")
            .await
            .unwrap()
            .unwrap()
            .id;

        let sub = service.unblock_token(&token).await.unwrap();
        assert_eq!(sub.email, "mel@example.com");
        assert!(!sub.is_blocked());
    }
}
