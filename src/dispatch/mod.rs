//! Dispatch pipeline.
//!
//! A send request flows through recipient resolution, blacklist filtering,
//! template selection and rendering, and ends up either in the durable
//! queue or at the transport. Each stage returns a `Result`; the first
//! failure aborts the pipeline.

mod builder;
mod resolver;
mod service;
mod types;

pub use builder::{build_task, UNSUBSCRIBE_TOKEN_KEY};
pub use resolver::{resolve, ResolvedRecipients};
pub use service::DispatchService;
pub use types::{DispatchOutcome, MailTask, SendRequest};
