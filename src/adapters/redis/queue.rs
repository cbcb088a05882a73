//! Redis JobQueuePort implementation.

use super::pool::RedisPool;
use super::JOB_QUEUE;
use crate::domain::jobs::Job;
use crate::ports::queue::{JobQueuePort, QueueError};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

fn backend(err: impl Into<anyhow::Error>) -> QueueError {
    QueueError::Backend(err.into())
}

#[async_trait]
impl JobQueuePort for RedisPool {
    async fn enqueue_job(&self, job: Job) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(&job).map_err(backend)?;
        conn.lpush::<_, _, ()>(JOB_QUEUE, json).await.map_err(backend)?;
        Ok(())
    }

    async fn dequeue_job(&self, timeout: Duration) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn().await?;
        let result: Option<(String, String)> = conn
            .brpop(JOB_QUEUE, timeout.as_secs_f64())
            .await
            .map_err(backend)?;
        match result {
            Some((_, json)) => Ok(Some(serde_json::from_str(&json).map_err(backend)?)),
            None => Ok(None),
        }
    }
}
