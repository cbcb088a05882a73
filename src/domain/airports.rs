//! Airport reference data: search keywords and haversine nearest-neighbour.

use super::text::tokens;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
const MIN_PREFIX: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    /// IATA code, unique.
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyAirport {
    #[serde(flatten)]
    pub airport: Airport,
    pub distance_km: f64,
}

impl Airport {
    /// Rebuilds `keywords` from code, name, city and country.
    pub fn with_keywords(mut self) -> Self {
        self.code = self.code.trim().to_ascii_uppercase();
        self.keywords = generate_keywords(&[&self.code, &self.name, &self.city, &self.country]);
        self
    }

    /// True when every query token is one of the airport's keywords.
    pub fn matches(&self, query: &str) -> bool {
        let wanted = tokens(query);
        !wanted.is_empty() && wanted.iter().all(|t| self.keywords.binary_search(t).is_ok())
    }

    pub fn distance_km(&self, latitude: f64, longitude: f64) -> f64 {
        haversine_km((self.latitude, self.longitude), (latitude, longitude))
    }
}

/// Each folded word plus its prefixes of at least two characters, sorted.
pub fn generate_keywords(fields: &[&str]) -> Vec<String> {
    let mut out = BTreeSet::new();
    for field in fields {
        for word in tokens(field) {
            for end in MIN_PREFIX..word.len() {
                out.insert(word[..end].to_string());
            }
            out.insert(word);
        }
    }
    out.into_iter().collect()
}

/// Great-circle distance between two (lat, lon) points in degrees.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Closest `limit` airports to the point, nearest first.
pub fn nearest<'a, I>(airports: I, latitude: f64, longitude: f64, limit: usize) -> Vec<NearbyAirport>
where
    I: IntoIterator<Item = &'a Airport>,
{
    let mut ranked: Vec<NearbyAirport> = airports
        .into_iter()
        .map(|airport| NearbyAirport {
            distance_km: airport.distance_km(latitude, longitude),
            airport: airport.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked.truncate(limit);
    ranked
}
