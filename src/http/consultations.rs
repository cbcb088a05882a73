use super::AppState;
use crate::domain::leads::{ConsultationRequest, CustomerConsultation};
use crate::error::AppError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

/// 201 for a new (phone, tour) pair, 200 when it folds into an existing one.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<ConsultationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CustomerConsultation>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::bad_request("INVALID_CONSULTATION", e.body_text()))?;
    let request = request.validated()?;

    let record = state.consultations.record(request, Utc::now()).await?;
    let status = if record.is_repeat() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    tracing::info!(tour_id = %record.tour_id, count = record.count, "consultation recorded");
    Ok((status, Json(record)))
}
