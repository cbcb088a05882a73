use super::AppState;
use crate::domain::airports::{valid_coordinates, Airport, NearbyAirport};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct NearestParams {
    lat: f64,
    lon: f64,
    limit: Option<usize>,
}

fn clamp(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Airport>>, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::bad_request("INVALID_QUERY", "q is required"));
    }
    let found = state.airports.search(&params.q, clamp(params.limit)).await?;
    Ok(Json(found))
}

pub async fn nearest(
    State(state): State<AppState>,
    params: Result<Query<NearestParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<Vec<NearbyAirport>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request("INVALID_QUERY", e.body_text()))?;
    if !valid_coordinates(params.lat, params.lon) {
        return Err(AppError::bad_request("INVALID_QUERY", "lat/lon out of range"));
    }
    let found = state.airports.nearest(params.lat, params.lon, clamp(params.limit)).await?;
    Ok(Json(found))
}
