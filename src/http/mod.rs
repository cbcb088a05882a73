//! HTTP inbound adapter (axum).

mod airports;
mod consultations;
mod health;
mod shorts;

use crate::application::{IngestService, PlaybackService};
use crate::ports::repository::{AirportRepository, ConsultationRepository, ShortRepository};
use crate::telemetry;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub playback: Arc<PlaybackService>,
    pub shorts: Arc<dyn ShortRepository>,
    pub consultations: Arc<dyn ConsultationRepository>,
    pub airports: Arc<dyn AirportRepository>,
    /// Multipart video parts are streamed here before ingest.
    pub uploads_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/shorts", post(shorts::upload))
        .route("/shorts/playlist/:id", get(shorts::playlist))
        .route("/shorts/segment/:id/:segment", get(shorts::segment))
        .route("/shorts/:id", get(shorts::get_short))
        .route("/shorts/:id/status", get(shorts::status))
        .route("/shorts/:id/interactions/:kind", post(shorts::interact))
        .route("/consultations", post(consultations::create))
        .route("/airports/search", get(airports::search))
        .route("/airports/nearest", get(airports::nearest))
        // Upload size is enforced while streaming to disk.
        .layer(DefaultBodyLimit::disable())
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(telemetry::make_span)
                .on_response(telemetry::on_response)
                .on_failure(telemetry::on_failure),
        )
        .with_state(state)
}
