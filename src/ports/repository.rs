use crate::domain::airports::{Airport, NearbyAirport};
use crate::domain::leads::{ConsultationRequest, CustomerConsultation};
use crate::domain::shorts::Short;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Engagement counters carried by a short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Likes,
    Shares,
}

impl Counter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "view" | "views" => Some(Counter::Views),
            "like" | "likes" => Some(Counter::Likes),
            "share" | "shares" => Some(Counter::Shares),
            _ => None,
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            Counter::Views => "views",
            Counter::Likes => "likes",
            Counter::Shares => "shares",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortRepository: Send + Sync {
    /// Persist a new record; fails with `Conflict` when the id or slug exists
    async fn insert(&self, short: &Short) -> Result<(), RepoError>;

    async fn get(&self, id: &str) -> Result<Option<Short>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Short>, RepoError>;

    /// `inactive` → `active`; returns false when the record is missing or
    /// already left `inactive`
    async fn mark_active(&self, id: &str, video_url: &str, now: DateTime<Utc>) -> Result<bool, RepoError>;

    /// `inactive` → `deleted` with a deletion timestamp; same guard as above
    async fn mark_deleted(&self, id: &str, now: DateTime<Utc>) -> Result<bool, RepoError>;

    /// Bump a counter on an `active` record, returning the new value
    async fn increment(&self, id: &str, counter: Counter) -> Result<Option<u64>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    /// Upsert keyed by (phone number, tour id); repeats increment `count`
    async fn record(&self, request: ConsultationRequest, now: DateTime<Utc>) -> Result<CustomerConsultation, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AirportRepository: Send + Sync {
    /// Insert or replace by IATA code, regenerating search keywords
    async fn upsert_many(&self, airports: Vec<Airport>) -> Result<usize, RepoError>;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Airport>, RepoError>;

    async fn nearest(&self, latitude: f64, longitude: f64, limit: usize) -> Result<Vec<NearbyAirport>, RepoError>;
}
