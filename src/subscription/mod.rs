//! Subscription module for Courier.
//!
//! This module tracks every email address the service has seen:
//! - Opt-out token allocation on first contact
//! - Blacklist (blocked) status
//! - Block/unblock by email (upsert) or by token

mod repository;
mod types;

pub use repository::SubscriptionRepository;
pub use types::Subscription;
