//! Redis AirportRepository implementation.
//!
//! The airport list is small and read-mostly, so queries load every
//! document and filter in process.

use super::pool::RedisPool;
use super::{AIRPORT_CODES, AIRPORT_PREFIX};
use crate::domain::airports::{nearest, Airport, NearbyAirport};
use crate::ports::repository::{AirportRepository, RepoError};
use async_trait::async_trait;
use redis::AsyncCommands;

fn airport_key(code: &str) -> String {
    format!("{}{}", AIRPORT_PREFIX, code)
}

impl RedisPool {
    async fn all_airports(&self) -> Result<Vec<Airport>, RepoError> {
        let mut conn = self.conn().await?;
        let mut codes: Vec<String> = conn.smembers(AIRPORT_CODES).await?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        codes.sort();
        let keys: Vec<String> = codes.iter().map(|c| airport_key(c)).collect();
        let docs: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;
        docs.into_iter()
            .flatten()
            .map(|doc| serde_json::from_str(&doc).map_err(RepoError::from))
            .collect()
    }
}

#[async_trait]
impl AirportRepository for RedisPool {
    async fn upsert_many(&self, airports: Vec<Airport>) -> Result<usize, RepoError> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        let count = airports.len();
        for airport in airports {
            let airport = airport.with_keywords();
            pipe.set(airport_key(&airport.code), serde_json::to_string(&airport)?)
                .ignore()
                .sadd(AIRPORT_CODES, &airport.code)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(count)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Airport>, RepoError> {
        Ok(self
            .all_airports()
            .await?
            .into_iter()
            .filter(|a| a.matches(query))
            .take(limit)
            .collect())
    }

    async fn nearest(&self, latitude: f64, longitude: f64, limit: usize) -> Result<Vec<NearbyAirport>, RepoError> {
        let airports = self.all_airports().await?;
        Ok(nearest(airports.iter(), latitude, longitude, limit))
    }
}
