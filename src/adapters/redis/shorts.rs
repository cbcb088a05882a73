//! Redis ShortRepository implementation.

use super::pool::RedisPool;
use super::{SHORT_PREFIX, SHORT_SLUG_PREFIX};
use crate::domain::shorts::{Short, ShortStatus};
use crate::ports::repository::{Counter, RepoError, ShortRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;

fn short_key(id: &str) -> String {
    format!("{}{}", SHORT_PREFIX, id)
}

fn slug_key(slug: &str) -> String {
    format!("{}{}", SHORT_SLUG_PREFIX, slug)
}

#[async_trait]
impl ShortRepository for RedisPool {
    async fn insert(&self, short: &Short) -> Result<(), RepoError> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(short)?;

        let slug_claimed: bool = conn.set_nx(slug_key(&short.slug), &short.id).await?;
        if !slug_claimed {
            return Err(RepoError::Conflict(format!("slug {} already exists", short.slug)));
        }
        let created: bool = conn.set_nx(short_key(&short.id), json).await?;
        if !created {
            conn.del::<_, ()>(slug_key(&short.slug)).await?;
            return Err(RepoError::Conflict(format!("short {} already exists", short.id)));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Short>, RepoError> {
        self.get_doc(&short_key(id)).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Short>, RepoError> {
        let mut conn = self.conn().await?;
        let id: Option<String> = conn.get(slug_key(slug)).await?;
        match id {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    async fn mark_active(&self, id: &str, video_url: &str, now: DateTime<Utc>) -> Result<bool, RepoError> {
        let applied = self
            .update_doc(&short_key(id), |short: &mut Short| short.activate(video_url, now).then_some(()))
            .await?;
        Ok(applied.is_some())
    }

    async fn mark_deleted(&self, id: &str, now: DateTime<Utc>) -> Result<bool, RepoError> {
        let applied = self
            .update_doc(&short_key(id), |short: &mut Short| short.mark_deleted(now).then_some(()))
            .await?;
        Ok(applied.is_some())
    }

    async fn increment(&self, id: &str, counter: Counter) -> Result<Option<u64>, RepoError> {
        self.update_doc(&short_key(id), |short: &mut Short| {
            if short.status != ShortStatus::Active {
                return None;
            }
            let slot = match counter {
                Counter::Views => &mut short.views,
                Counter::Likes => &mut short.likes,
                Counter::Shares => &mut short.shares,
            };
            *slot += 1;
            Some(*slot)
        })
        .await
    }
}
