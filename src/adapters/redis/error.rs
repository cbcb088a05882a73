//! Redis error types for the adapter.

use crate::ports::queue::QueueError;
use crate::ports::repository::RepoError;
use deadpool_redis::CreatePoolError;

pub type RedisError = redis::RedisError;
pub type PoolError = deadpool_redis::PoolError;

#[derive(Debug, thiserror::Error)]
pub enum RedisAdapterError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("Create pool error: {0}")]
    CreatePool(String),
}

impl From<CreatePoolError> for RedisAdapterError {
    fn from(err: CreatePoolError) -> Self {
        RedisAdapterError::CreatePool(format!("{}", err))
    }
}

impl From<RedisAdapterError> for RepoError {
    fn from(err: RedisAdapterError) -> Self {
        RepoError::Backend(err.into())
    }
}

impl From<RedisAdapterError> for QueueError {
    fn from(err: RedisAdapterError) -> Self {
        QueueError::Backend(err.into())
    }
}

impl From<RedisError> for RepoError {
    fn from(err: RedisError) -> Self {
        RedisAdapterError::from(err).into()
    }
}

impl From<PoolError> for RepoError {
    fn from(err: PoolError) -> Self {
        RedisAdapterError::from(err).into()
    }
}
