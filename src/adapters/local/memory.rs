//! In-process repositories for development and tests.

use crate::domain::airports::{nearest, Airport, NearbyAirport};
use crate::domain::leads::{ConsultationRequest, CustomerConsultation};
use crate::domain::shorts::{Short, ShortStatus};
use crate::ports::repository::{AirportRepository, ConsultationRepository, Counter, RepoError, ShortRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    shorts: HashMap<String, Short>,
    slugs: HashMap<String, String>,
    consultations: HashMap<(String, String), CustomerConsultation>,
    airports: BTreeMap<String, Airport>,
}

/// Cloneable handle to one shared set of collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn short_count(&self) -> usize {
        self.inner.read().await.shorts.len()
    }

    async fn transition<F>(&self, id: &str, apply: F) -> Result<bool, RepoError>
    where
        F: FnOnce(&mut Short) -> bool + Send,
    {
        let mut inner = self.inner.write().await;
        Ok(inner.shorts.get_mut(id).map(apply).unwrap_or(false))
    }
}

#[async_trait]
impl ShortRepository for MemoryStore {
    async fn insert(&self, short: &Short) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        if inner.shorts.contains_key(&short.id) {
            return Err(RepoError::Conflict(format!("short {} already exists", short.id)));
        }
        if inner.slugs.contains_key(&short.slug) {
            return Err(RepoError::Conflict(format!("slug {} already exists", short.slug)));
        }
        inner.slugs.insert(short.slug.clone(), short.id.clone());
        inner.shorts.insert(short.id.clone(), short.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Short>, RepoError> {
        Ok(self.inner.read().await.shorts.get(id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Short>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner.slugs.get(slug).and_then(|id| inner.shorts.get(id)).cloned())
    }

    async fn mark_active(&self, id: &str, video_url: &str, now: DateTime<Utc>) -> Result<bool, RepoError> {
        self.transition(id, |short| short.activate(video_url, now)).await
    }

    async fn mark_deleted(&self, id: &str, now: DateTime<Utc>) -> Result<bool, RepoError> {
        self.transition(id, |short| short.mark_deleted(now)).await
    }

    async fn increment(&self, id: &str, counter: Counter) -> Result<Option<u64>, RepoError> {
        let mut inner = self.inner.write().await;
        let Some(short) = inner.shorts.get_mut(id).filter(|s| s.status == ShortStatus::Active) else {
            return Ok(None);
        };
        let slot = match counter {
            Counter::Views => &mut short.views,
            Counter::Likes => &mut short.likes,
            Counter::Shares => &mut short.shares,
        };
        *slot += 1;
        Ok(Some(*slot))
    }
}

#[async_trait]
impl ConsultationRepository for MemoryStore {
    async fn record(&self, request: ConsultationRequest, now: DateTime<Utc>) -> Result<CustomerConsultation, RepoError> {
        let mut inner = self.inner.write().await;
        let key = request.dedup_key();
        let record = match inner.consultations.get_mut(&key) {
            Some(existing) => {
                existing.repeat(request, now);
                existing.clone()
            }
            None => {
                let created = CustomerConsultation::first(Uuid::new_v4().to_string(), request, now);
                inner.consultations.insert(key, created.clone());
                created
            }
        };
        Ok(record)
    }
}

#[async_trait]
impl AirportRepository for MemoryStore {
    async fn upsert_many(&self, airports: Vec<Airport>) -> Result<usize, RepoError> {
        let mut inner = self.inner.write().await;
        let count = airports.len();
        for airport in airports {
            let airport = airport.with_keywords();
            inner.airports.insert(airport.code.clone(), airport);
        }
        Ok(count)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Airport>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner
            .airports
            .values()
            .filter(|a| a.matches(query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn nearest(&self, latitude: f64, longitude: f64, limit: usize) -> Result<Vec<NearbyAirport>, RepoError> {
        let inner = self.inner.read().await;
        Ok(nearest(inner.airports.values(), latitude, longitude, limit))
    }
}
