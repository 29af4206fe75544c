//! Background jobs
//!
//! Notification work runs off the request path on a single worker task.

pub mod notifications;
pub mod queue;

pub use notifications::{LogNotifier, Notification, NotificationHandler, Notifier, NotifyError};
pub use queue::{process, Job, JobError, JobHandler, JobQueue, MAX_TRIES};
