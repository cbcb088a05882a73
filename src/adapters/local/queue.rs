//! In-process job queue shared by the worker tasks.

use crate::domain::jobs::Job;
use crate::ports::queue::{JobQueuePort, QueueError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

#[derive(Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
}

impl ChannelQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

impl Default for ChannelQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueuePort for ChannelQueue {
    async fn enqueue_job(&self, job: Job) -> Result<(), QueueError> {
        self.sender.send(job).map_err(|_| QueueError::Closed)
    }

    async fn dequeue_job(&self, timeout: Duration) -> Result<Option<Job>, QueueError> {
        // Only one worker waits on the receiver at a time; the others queue on the lock.
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(job)) => Ok(Some(job)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}
