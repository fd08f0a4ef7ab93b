//! Subscription types for Courier.

use serde::Serialize;
use sqlx::FromRow;

/// A subscription record for a single email address.
///
/// One row exists per address the service has ever seen. The `id` is the
/// address's opt-out token and is exposed to templates as
/// `unsubscribeToken` for building unsubscribe links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Subscription {
    /// Opt-out token (primary key).
    pub id: String,
    /// Email address (unique).
    pub email: String,
    /// Whether the address has opted out of mail.
    pub blocked: bool,
}

impl Subscription {
    /// Blacklist policy: a blocked subscription must never receive mail.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}
