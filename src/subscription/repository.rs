//! Subscription repository for Courier.
//!
//! This module provides CRUD operations for subscription records.

use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

use super::types::Subscription;
use crate::{CourierError, Result};

/// Repository for subscription operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new SubscriptionRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find subscriptions for any of the given email addresses.
    ///
    /// Returns only the records that exist; callers treat addresses with no
    /// matching record as unknown.
    pub async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<Subscription>> {
        if emails.is_empty() {
            return Ok(vec![]);
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT id, email, blocked FROM subscription WHERE email IN (");
        let mut separated = query.separated(", ");
        for email in emails {
            separated.push_bind(email);
        }
        query.push(")");

        let subs = query
            .build_query_as::<Subscription>()
            .fetch_all(self.pool)
            .await?;

        Ok(subs)
    }

    /// Get a subscription by email address.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Subscription>> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT id, email, blocked FROM subscription WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(sub)
    }

    /// Get a subscription by token.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<Subscription>> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT id, email, blocked FROM subscription WHERE id = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(sub)
    }

    /// Create subscription records for the given addresses.
    ///
    /// Each address receives a fresh token and `blocked = false`. The caller
    /// ensures none of the addresses already has a record.
    pub async fn create_many(&self, emails: &[String]) -> Result<Vec<Subscription>> {
        if emails.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(emails.len());

        for email in emails {
            let token = Uuid::new_v4().to_string();
            sqlx::query("INSERT INTO subscription (id, email, blocked) VALUES (?, ?, 0)")
                .bind(&token)
                .bind(email)
                .execute(&mut *tx)
                .await?;

            created.push(Subscription {
                id: token,
                email: email.clone(),
                blocked: false,
            });
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Set the blocked flag for an email address.
    ///
    /// Upsert semantics: if no record exists for the address, one is created
    /// with the given blocked value.
    pub async fn set_blocked_by_email(&self, email: &str, blocked: bool) -> Result<Subscription> {
        // Single upsert so concurrent callers cannot race between a failed
        // UPDATE and a conflicting INSERT. The token of an existing record
        // is kept; the candidate id is only used for a fresh row.
        let token = Uuid::new_v4().to_string();
        let sub = sqlx::query_as::<_, Subscription>(
            "INSERT INTO subscription (id, email, blocked) VALUES (?, ?, ?) \
             ON CONFLICT(email) DO UPDATE SET blocked = excluded.blocked \
             RETURNING id, email, blocked",
        )
        .bind(&token)
        .bind(email)
        .bind(blocked)
        .fetch_one(self.pool)
        .await?;

        Ok(sub)
    }

    /// Set the blocked flag for a token.
    ///
    /// Unlike the email selector, this never auto-creates: an unknown token
    /// is a `NotFound` error.
    pub async fn set_blocked_by_token(&self, token: &str, blocked: bool) -> Result<Subscription> {
        let result = sqlx::query("UPDATE subscription SET blocked = ? WHERE id = ?")
            .bind(blocked)
            .bind(token)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CourierError::NotFound("subscription".to_string()));
        }

        self.get_by_token(token)
            .await?
            .ok_or_else(|| CourierError::NotFound("subscription".to_string()))
    }
}
