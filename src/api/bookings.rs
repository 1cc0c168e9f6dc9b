use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::{AppState, IdentityQuery};
use crate::domain::{Booking, BookingStatus, RecordId, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// Any status may be written; the caller owns transition rules.
pub async fn update_status(
    Path(id): Path<String>,
    Query(params): Query<IdentityQuery>,
    State(state): State<AppState>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Booking>, AppError> {
    let status = BookingStatus::parse(&body.status);
    if !status.is_recognized() {
        return Err(AppError::BadRequest(format!(
            "Unknown booking status: {}",
            body.status
        )));
    }

    let booking = state
        .marketplace
        .update_booking_status(&params.actor(), &RecordId::new(id), status, TimeMs::now())
        .await?;
    Ok(Json(booking))
}

pub async fn delete(
    Path(id): Path<String>,
    Query(params): Query<IdentityQuery>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .marketplace
        .delete_booking(&params.actor(), &RecordId::new(id), TimeMs::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
