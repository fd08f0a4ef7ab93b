//! Durable mail queue.
//!
//! Queued mail tasks are persisted in the `mailqueue` table and delivered
//! by a background poller. Items survive restarts and are retried with
//! backoff until delivery succeeds.

mod backoff;
mod poller;
mod repository;

pub use backoff::BackoffPolicy;
pub use poller::{start_queue_poller, QueuePoller};
pub use repository::{MailQueueRepository, QueueItem};
