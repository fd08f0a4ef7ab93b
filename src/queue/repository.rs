//! Mail queue repository for Courier.
//!
//! Durable storage for built tasks awaiting delivery. The claim operation
//! is a single conditional UPDATE so that concurrent pollers, including
//! pollers in other service instances sharing the database, can never both
//! claim the same item.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::dispatch::MailTask;
use crate::template::BodyKind;
use crate::{CourierError, Result};

/// A persisted task plus its delivery bookkeeping.
#[derive(Debug, Clone, FromRow)]
pub struct QueueItem {
    /// Queue item id.
    pub id: String,
    /// Comma-joined `to` addresses.
    pub to_addrs: String,
    /// Comma-joined `cc` addresses.
    pub cc_addrs: String,
    /// Comma-joined `bcc` addresses.
    pub bcc_addrs: String,
    /// Sender address.
    pub from_addr: String,
    /// Rendered subject.
    pub subject: String,
    /// Body kind name: markdown, html or text.
    pub body_kind: String,
    /// Rendered body.
    pub body: String,
    /// Completed delivery attempts.
    pub attempts: i64,
    /// Delivery lease expiry. `None` means unclaimed; a past timestamp
    /// means the claiming process died and the item is claimable again.
    pub claimed_until: Option<DateTime<Utc>>,
    /// When the item next becomes eligible for delivery.
    pub next_eligible: DateTime<Utc>,
}

impl QueueItem {
    /// Reconstruct the mail task for delivery.
    pub fn task(&self) -> Result<MailTask> {
        let kind = BodyKind::parse(&self.body_kind).ok_or_else(|| {
            CourierError::Database(format!("unknown body kind '{}'", self.body_kind))
        })?;

        let mut task = MailTask {
            to: self.to_addrs.clone(),
            cc: self.cc_addrs.clone(),
            bcc: self.bcc_addrs.clone(),
            from: self.from_addr.clone(),
            subject: self.subject.clone(),
            text: None,
            html: None,
            markdown: None,
        };
        task.set_body(kind, self.body.clone());
        Ok(task)
    }
}

const ITEM_COLUMNS: &str = "id, to_addrs, cc_addrs, bcc_addrs, from_addr, subject, \
     body_kind, body, attempts, claimed_until, next_eligible";

/// Repository for mail queue operations.
pub struct MailQueueRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MailQueueRepository<'a> {
    /// Create a new MailQueueRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a task for background delivery.
    ///
    /// The item starts unclaimed with zero attempts and is eligible
    /// immediately.
    pub async fn enqueue(&self, task: &MailTask) -> Result<String> {
        let (kind, body) = task
            .body()
            .ok_or_else(|| CourierError::Database("task has no body".to_string()))?;

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO mailqueue \
             (id, to_addrs, cc_addrs, bcc_addrs, from_addr, subject, body_kind, body, \
              attempts, claimed_until, next_eligible) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)",
        )
        .bind(&id)
        .bind(&task.to)
        .bind(&task.cc)
        .bind(&task.bcc)
        .bind(&task.from)
        .bind(&task.subject)
        .bind(kind.as_str())
        .bind(body)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(id)
    }

    /// Atomically claim one eligible item for `lease` long.
    ///
    /// The claim is a conditional UPDATE against the store; two concurrent
    /// pollers can never both receive the same item. Items whose previous
    /// claim lease has expired count as unclaimed, so an item stranded by a
    /// crashed process becomes deliverable again after the lease runs out.
    pub async fn claim_next(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<QueueItem>> {
        let claimed_until = now + lease;
        let item = sqlx::query_as::<_, QueueItem>(&format!(
            "UPDATE mailqueue SET claimed_until = ? \
             WHERE id = ( \
                 SELECT id FROM mailqueue \
                 WHERE (claimed_until IS NULL OR claimed_until <= ?) \
                   AND next_eligible <= ? \
                 ORDER BY next_eligible \
                 LIMIT 1 \
             ) AND (claimed_until IS NULL OR claimed_until <= ?) \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(claimed_until)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(item)
    }

    /// Remove a delivered (or permanently dropped) item.
    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM mailqueue WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Release a claimed item after a failed attempt.
    ///
    /// Increments the attempt counter and schedules the next try.
    pub async fn release(&self, id: &str, next_eligible: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE mailqueue SET claimed_until = NULL, attempts = attempts + 1, \
             next_eligible = ? WHERE id = ?",
        )
        .bind(next_eligible)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Get a queue item by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<QueueItem>> {
        let item = sqlx::query_as::<_, QueueItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM mailqueue WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(item)
    }

    /// Count items in the queue.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mailqueue")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Duration as ChronoDuration;

    fn lease() -> ChronoDuration {
        ChronoDuration::minutes(10)
    }

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

    #[tokio::test]
    async fn test_enqueue_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let id = repo.enqueue(&task("Hello")).await.unwrap();
        let item = repo.get_by_id(&id).await.unwrap().unwrap();

        assert_eq!(item.subject, "Hello");
        assert_eq!(item.attempts, 0);
        assert!(item.claimed_until.is_none());
        assert_eq!(item.body_kind, "text");
        assert_eq!(item.body, "body");
    }

    #[tokio::test]
    async fn test_item_task_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let original = task("Hello");
        let id = repo.enqueue(&original).await.unwrap();
        let item = repo.get_by_id(&id).await.unwrap().unwrap();

        assert_eq!(item.task().unwrap(), original);
    }

    #[tokio::test]
    async fn test_claim_next_claims_eligible_item() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let id = repo.enqueue(&task("Hello")).await.unwrap();

        let item = repo.claim_next(Utc::now(), lease()).await.unwrap().unwrap();
        assert_eq!(item.id, id);
        assert!(item.claimed_until.is_some());
    }

    #[tokio::test]
    async fn test_claimed_item_is_not_claimable_again() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        repo.enqueue(&task("Hello")).await.unwrap();

        assert!(repo.claim_next(Utc::now(), lease()).await.unwrap().is_some());
        assert!(repo.claim_next(Utc::now(), lease()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_claim_is_claimable_again() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let id = repo.enqueue(&task("Hello")).await.unwrap();

        // A process claims the item and dies without settling it
        let now = Utc::now();
        assert!(repo.claim_next(now, lease()).await.unwrap().is_some());
        assert!(repo.claim_next(now, lease()).await.unwrap().is_none());

        // Once the lease expires the item is deliverable again
        let after_lease = now + lease() + ChronoDuration::seconds(1);
        let reclaimed = repo.claim_next(after_lease, lease()).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
    }

    #[tokio::test]
    async fn test_future_item_is_not_eligible() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let id = repo.enqueue(&task("Hello")).await.unwrap();
        repo.release(&id, Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();

        assert!(repo.claim_next(Utc::now(), lease()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_increments_attempts_and_reschedules() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let id = repo.enqueue(&task("Hello")).await.unwrap();
        repo.claim_next(Utc::now(), lease()).await.unwrap().unwrap();

        let eligible_at = Utc::now() - ChronoDuration::seconds(1);
        repo.release(&id, eligible_at).await.unwrap();

        let item = repo.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.claimed_until.is_none());

        // Released item becomes claimable again once eligible
        let reclaimed = repo.claim_next(Utc::now(), lease()).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let id = repo.enqueue(&task("Hello")).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.delete(&id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.get_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_order_is_oldest_eligible_first() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MailQueueRepository::new(db.pool());

        let first = repo.enqueue(&task("first")).await.unwrap();
        let second = repo.enqueue(&task("second")).await.unwrap();

        // Push the first item further into the past
        repo.release(&first, Utc::now() - ChronoDuration::hours(1))
            .await
            .unwrap();

        let claimed = repo.claim_next(Utc::now(), lease()).await.unwrap().unwrap();
        assert_eq!(claimed.id, first);

        let claimed = repo.claim_next(Utc::now(), lease()).await.unwrap().unwrap();
        assert_eq!(claimed.id, second);
    }
}
