//! Recipient resolution for Courier.
//!
//! Resolves a request's recipient lists against the subscription store and
//! partitions them into allowed and blocked, creating subscription records
//! for addresses seen for the first time.

use std::collections::HashSet;

use crate::subscription::{Subscription, SubscriptionRepository};
use crate::Result;

use super::types::SendRequest;

/// The partition of a request's recipients.
///
/// Every address in the request's to/cc/bcc lists is represented in exactly
/// one of the two partitions.
#[derive(Debug, Clone)]
pub struct ResolvedRecipients {
    /// Subscriptions that may receive mail, including newly created ones.
    pub allowed: Vec<Subscription>,
    /// Subscriptions that have opted out.
    pub blocked: Vec<Subscription>,
}

impl ResolvedRecipients {
    /// Find the allowed subscription for an address.
    pub fn allowed_by_email(&self, email: &str) -> Option<&Subscription> {
        self.allowed.iter().find(|sub| sub.email == email)
    }
}

/// Resolve the request's recipients against the subscription store.
///
/// Unknown addresses get a fresh subscription record (`blocked = false`) and
/// join the allowed partition. Store errors abort the pipeline; no partial
/// resolution is surfaced as success.
pub async fn resolve(
    repo: &SubscriptionRepository<'_>,
    request: &SendRequest,
) -> Result<ResolvedRecipients> {
    // Distinct address set, preserving first-seen order
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for email in request.all_recipients() {
        if seen.insert(email.as_str()) {
            distinct.push(email.clone());
        }
    }

    let found = repo.find_by_emails(&distinct).await?;
    let known: HashSet<String> = found.iter().map(|sub| sub.email.clone()).collect();

    let mut allowed = Vec::new();
    let mut blocked = Vec::new();
    for sub in found {
        if sub.is_blocked() {
            blocked.push(sub);
        } else {
            allowed.push(sub);
        }
    }

    // Explicit set subtraction over address values
    let unknown: Vec<String> = distinct
        .iter()
        .filter(|email| !known.contains(*email))
        .cloned()
        .collect();

    let created = repo.create_many(&unknown).await?;
    allowed.extend(created);

    Ok(ResolvedRecipients { allowed, blocked })
}
