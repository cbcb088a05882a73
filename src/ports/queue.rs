use crate::domain::jobs::Job;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
    #[error("job queue backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueuePort: Send + Sync {
    /// Enqueue a job
    async fn enqueue_job(&self, job: Job) -> Result<(), QueueError>;

    /// Dequeue a job, waiting at most `timeout`; `Ok(None)` on timeout
    async fn dequeue_job(&self, timeout: Duration) -> Result<Option<Job>, QueueError>;
}
