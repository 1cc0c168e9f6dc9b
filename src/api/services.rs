use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::{AppState, IdentityQuery};
use crate::domain::{ListingStatus, RecordId, ServiceListing, TimeMs};
use crate::error::AppError;

/// Publicly visible listings.
pub async fn get_catalog(State(state): State<AppState>) -> Json<Vec<ServiceListing>> {
    Json(state.marketplace.catalog().await)
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub async fn update_status(
    Path(id): Path<String>,
    Query(params): Query<IdentityQuery>,
    State(state): State<AppState>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ServiceListing>, AppError> {
    let status = ListingStatus::parse(&body.status);
    if let ListingStatus::Unrecognized(raw) = &status {
        return Err(AppError::BadRequest(format!("Unknown listing status: {}", raw)));
    }

    let listing = state
        .marketplace
        .update_listing_status(&params.actor(), &RecordId::new(id), status, TimeMs::now())
        .await?;
    Ok(Json(listing))
}

pub async fn delete(
    Path(id): Path<String>,
    Query(params): Query<IdentityQuery>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .marketplace
        .delete_listing(&params.actor(), &RecordId::new(id), TimeMs::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
