//! Redis ConsultationRepository implementation.

use super::pool::RedisPool;
use super::CONSULTATION_PREFIX;
use crate::domain::leads::{ConsultationRequest, CustomerConsultation};
use crate::ports::repository::{ConsultationRepository, RepoError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use uuid::Uuid;

fn consultation_key(request: &ConsultationRequest) -> String {
    let (phone, tour) = request.dedup_key();
    format!("{}{}:{}", CONSULTATION_PREFIX, phone, tour)
}

#[async_trait]
impl ConsultationRepository for RedisPool {
    async fn record(&self, request: ConsultationRequest, now: DateTime<Utc>) -> Result<CustomerConsultation, RepoError> {
        let key = consultation_key(&request);

        let repeated = self
            .update_doc(&key, |existing: &mut CustomerConsultation| {
                existing.repeat(request.clone(), now);
                Some(existing.clone())
            })
            .await?;
        if let Some(record) = repeated {
            return Ok(record);
        }

        let created = CustomerConsultation::first(Uuid::new_v4().to_string(), request.clone(), now);
        let mut conn = self.conn().await?;
        let stored: bool = conn.set_nx(&key, serde_json::to_string(&created)?).await?;
        if stored {
            return Ok(created);
        }

        // Lost the race to a concurrent first submission.
        self.update_doc(&key, |existing: &mut CustomerConsultation| {
            existing.repeat(request.clone(), now);
            Some(existing.clone())
        })
        .await?
        .ok_or_else(|| RepoError::Conflict(format!("{} vanished during upsert", key)))
    }
}
