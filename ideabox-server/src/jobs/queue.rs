//! In-process job queue
//!
//! Jobs go through an unbounded mpsc channel to one worker. Each job is
//! attempted up to [`MAX_TRIES`] times back to back; a job that still fails
//! is logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::DbError;

pub const MAX_TRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    CommentAdded { comment_id: Uuid },
    StatusChanged { post_id: Uuid, status_id: Uuid },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CommentAdded { .. } => "comment_added",
            Self::StatusChanged { .. } => "status_changed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Db(#[from] DbError),
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), JobError>;
}

/// Run `job` until it succeeds or [`MAX_TRIES`] attempts have failed.
///
/// Returns the number of attempts made on success, the last error otherwise.
pub async fn process(handler: &dyn JobHandler, job: &Job) -> Result<u32, JobError> {
    let mut attempt = 1;
    loop {
        match handler.handle(job).await {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt < MAX_TRIES => {
                tracing::warn!(job = job.name(), attempt, error = %e, "job failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Handle for enqueueing jobs
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Spawn the worker and return the queue feeding it.
    ///
    /// The worker exits once every `JobQueue` clone has been dropped.
    pub fn start(handler: Arc<dyn JobHandler>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match process(handler.as_ref(), &job).await {
                    Ok(attempts) => {
                        tracing::debug!(job = job.name(), attempts, "job done");
                    }
                    Err(e) => {
                        tracing::error!(job = ?job, tries = MAX_TRIES, error = %e, "job failed permanently");
                    }
                }
            }
            tracing::debug!("job worker stopped");
        });
        (Self { tx }, worker)
    }

    /// Queue with no worker; enqueued jobs are dropped with a warning.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn enqueue(&self, job: Job) {
        let name = job.name();
        if self.tx.send(job).is_err() {
            tracing::warn!(job = name, "job worker is not running, job dropped");
        }
    }
}
