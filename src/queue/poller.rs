//! Background delivery poller for Courier.
//!
//! This module provides the background task that periodically claims due
//! queue items and hands them to the mail transport, re-queueing failures
//! with backoff.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::db::Database;
use crate::transport::Transport;

use super::backoff::BackoffPolicy;
use super::repository::{MailQueueRepository, QueueItem};

/// Mail queue background poller.
///
/// Manages a background task that periodically claims eligible queue items
/// and attempts delivery.
pub struct QueuePoller {
    db: Database,
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
    backoff: BackoffPolicy,
    max_attempts: Option<u32>,
    claim_lease: ChronoDuration,
}

impl QueuePoller {
    /// Create a new QueuePoller from the queue configuration.
    pub fn new(db: Database, transport: Arc<dyn Transport>, config: &QueueConfig) -> Self {
        Self {
            db,
            transport,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            backoff: BackoffPolicy::from_config(config),
            max_attempts: config.max_attempts,
            claim_lease: ChronoDuration::seconds(config.claim_lease_secs as i64),
        }
    }

    /// Run the poller loop.
    ///
    /// This method runs indefinitely, draining due items at the configured
    /// interval.
    pub async fn run(&self) {
        info!(
            "Queue poller started (poll interval: {} seconds)",
            self.poll_interval.as_secs()
        );

        let mut timer = interval(self.poll_interval);

        loop {
            timer.tick().await;
            self.drain_due().await;
        }
    }

    /// Claim and deliver every item due at the start of the cycle, one at
    /// a time.
    ///
    /// The eligibility timestamp is fixed once per cycle: an item released
    /// after a failed attempt stays pending until the next cycle, even with
    /// a zero backoff delay.
    pub async fn drain_due(&self) {
        debug!("Checking for due queue items");

        let now = Utc::now();
        loop {
            let repo = MailQueueRepository::new(self.db.pool());
            let item = match repo.claim_next(now, self.claim_lease).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    debug!("No due queue items");
                    return;
                }
                Err(e) => {
                    error!("Failed to claim queue item: {}", e);
                    return;
                }
            };

            self.deliver_item(item).await;
        }
    }

    /// Deliver a single claimed item and settle its queue state.
    async fn deliver_item(&self, item: QueueItem) {
        let repo = MailQueueRepository::new(self.db.pool());

        let task = match item.task() {
            Ok(task) => task,
            Err(e) => {
                // Undeliverable row; dropping it beats claiming it forever
                error!("Queue item {} is malformed, dropping: {}", item.id, e);
                if let Err(e) = repo.delete(&item.id).await {
                    error!("Failed to drop queue item {}: {}", item.id, e);
                }
                return;
            }
        };

        match self.transport.send(&task).await {
            Ok(info) => {
                debug!(
                    "Delivered queue item {} (message {})",
                    item.id, info.message_id
                );
                if let Err(e) = repo.delete(&item.id).await {
                    error!("Failed to remove delivered item {}: {}", item.id, e);
                }
            }
            Err(e) => {
                let attempts = (item.attempts + 1) as u32;
                warn!(
                    "Delivery of item {} failed (attempt {}): {}",
                    item.id, attempts, e
                );

                if let Some(max) = self.max_attempts {
                    if attempts >= max {
                        error!(
                            "Dropping item {} after {} attempts (to: {}, subject: {})",
                            item.id, attempts, task.to, task.subject
                        );
                        if let Err(e) = repo.delete(&item.id).await {
                            error!("Failed to drop item {}: {}", item.id, e);
                        }
                        return;
                    }
                }

                let delay = self.backoff.delay(attempts);
                let next_eligible = Utc::now()
                    + ChronoDuration::from_std(delay).unwrap_or(ChronoDuration::zero());
                if let Err(e) = repo.release(&item.id, next_eligible).await {
                    error!("Failed to release item {}: {}", item.id, e);
                }
            }
        }
    }
}

/// Start the queue poller as a background task.
pub fn start_queue_poller(
    db: Database,
    transport: Arc<dyn Transport>,
    config: &QueueConfig,
) -> tokio::task::JoinHandle<()> {
    let poller = QueuePoller::new(db, transport, config);
    tokio::spawn(async move {
        poller.run().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MailTask;
    use crate::transport::StubMailer;

    fn task(subject: &str) -> MailTask {
        MailTask {
            to: "mel@example.com".to_string(),
            cc: String::new(),
            bcc: String::new(),
            from: "bev@example.com".to_string(),
            subject: subject.to_string(),
            text: Some("body".to_string()),
            html: None,
            markdown: None,
        }
    }

    fn poller(db: &Database, stub: &Arc<StubMailer>, config: &QueueConfig) -> QueuePoller {
        QueuePoller::new(
            db.clone(),
            stub.clone() as Arc<dyn Transport>,
            config,
        )
    }

    #[tokio::test]
    async fn test_drain_delivers_and_removes() {
        let db = Database::open_in_memory().await.unwrap();
        let stub = Arc::new(StubMailer::new());
        let config = QueueConfig::default();

        let repo = MailQueueRepository::new(db.pool());
        repo.enqueue(&task("one")).await.unwrap();
        repo.enqueue(&task("two")).await.unwrap();

        poller(&db, &stub, &config).drain_due().await;

        assert_eq!(stub.sent().len(), 2);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_stays_queued_with_backoff() {
        let db = Database::open_in_memory().await.unwrap();
        let stub = Arc::new(StubMailer::new());
        let config = QueueConfig::default();

        let repo = MailQueueRepository::new(db.pool());
        let id = repo.enqueue(&task("flaky")).await.unwrap();

        stub.fail_next(1);
        poller(&db, &stub, &config).drain_due().await;

        // Still queued, one attempt recorded, not claimed, scheduled later
        let item = repo.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.claimed_until.is_none());
        assert!(item.next_eligible > Utc::now());
        assert!(stub.sent().is_empty());
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failure() {
        let db = Database::open_in_memory().await.unwrap();
        let stub = Arc::new(StubMailer::new());
        let mut config = QueueConfig::default();
        config.backoff_base_secs = 0;

        let repo = MailQueueRepository::new(db.pool());
        let id = repo.enqueue(&task("flaky")).await.unwrap();

        let poller = poller(&db, &stub, &config);
        stub.fail_next(1);
        poller.drain_due().await;
        assert_eq!(repo.get_by_id(&id).await.unwrap().unwrap().attempts, 1);

        // Next cycle: transport recovered, item is removed only now
        poller.drain_due().await;
        assert_eq!(stub.sent().len(), 1);
        assert!(repo.get_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_backoff_retry_waits_for_next_cycle() {
        let db = Database::open_in_memory().await.unwrap();
        let stub = Arc::new(StubMailer::new());
        let mut config = QueueConfig::default();
        config.backoff_base_secs = 0;

        let repo = MailQueueRepository::new(db.pool());
        let id = repo.enqueue(&task("impatient")).await.unwrap();

        // Transport fails twice; a single cycle must not burn through both
        // retries even though the release delay is zero
        stub.fail_next(2);
        poller(&db, &stub, &config).drain_due().await;

        let item = repo.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.attempts, 1);
        assert!(stub.sent().is_empty());
    }

    #[tokio::test]
    async fn test_max_attempts_drops_item() {
        let db = Database::open_in_memory().await.unwrap();
        let stub = Arc::new(StubMailer::new());
        let mut config = QueueConfig::default();
        config.backoff_base_secs = 0;
        config.max_attempts = Some(2);

        let repo = MailQueueRepository::new(db.pool());
        let id = repo.enqueue(&task("dead")).await.unwrap();

        let poller = poller(&db, &stub, &config);
        stub.fail_next(10);
        poller.drain_due().await;
        assert!(repo.get_by_id(&id).await.unwrap().is_some());

        poller.drain_due().await;
        assert!(repo.get_by_id(&id).await.unwrap().is_none());
        assert!(stub.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_retry_by_default() {
        let db = Database::open_in_memory().await.unwrap();
        let stub = Arc::new(StubMailer::new());
        let mut config = QueueConfig::default();
        config.backoff_base_secs = 0;
        assert!(config.max_attempts.is_none());

        let repo = MailQueueRepository::new(db.pool());
        let id = repo.enqueue(&task("stubborn")).await.unwrap();

        let poller = poller(&db, &stub, &config);
        stub.fail_next(5);
        for _ in 0..5 {
            poller.drain_due().await;
        }

        let item = repo.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.attempts, 5);
    }
}
