//! Redis connection pool and the compare-and-set primitive shared by the
//! repositories.

use super::error::RedisAdapterError;
use crate::ports::repository::RepoError;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use once_cell::sync::Lazy;
use redis::{AsyncCommands, Script};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Replaces `KEYS[1]` only while it still holds `ARGV[1]`.
static COMPARE_AND_SET: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            redis.call('SET', KEYS[1], ARGV[2])
            return 1
        end
        return 0
        "#,
    )
});

/// Attempts before a contended document update gives up.
const CAS_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
}

impl RedisPool {
    pub fn new(redis_url: &str) -> Result<Self, RedisAdapterError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    pub(super) async fn conn(&self) -> Result<Connection, RedisAdapterError> {
        Ok(self.pool.get().await?)
    }

    pub(super) async fn get_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RepoError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw.map(|data| serde_json::from_str(&data)).transpose()?)
    }

    /// Read-modify-write of one JSON document.
    ///
    /// `apply` returns `None` to leave the document alone. The write lands
    /// only if nobody changed the document since it was read; otherwise the
    /// read and `apply` run again.
    pub(super) async fn update_doc<T, R, F>(&self, key: &str, mut apply: F) -> Result<Option<R>, RepoError>
    where
        T: Serialize + DeserializeOwned + Send,
        R: Send,
        F: FnMut(&mut T) -> Option<R> + Send,
    {
        let mut conn = self.conn().await?;
        for _ in 0..CAS_ATTEMPTS {
            let Some(current) = conn.get::<_, Option<String>>(key).await? else {
                return Ok(None);
            };
            let mut doc: T = serde_json::from_str(&current)?;
            let Some(result) = apply(&mut doc) else {
                return Ok(None);
            };
            let next = serde_json::to_string(&doc)?;
            let swapped: i64 = COMPARE_AND_SET
                .key(key)
                .arg(&current)
                .arg(&next)
                .invoke_async(&mut conn)
                .await?;
            if swapped == 1 {
                return Ok(Some(result));
            }
            tracing::debug!("document {} changed underneath, retrying", key);
        }
        Err(RepoError::Conflict(format!("{} kept changing during update", key)))
    }
}
