//! A provider's own bookings, listings and dashboard header.

use axum::extract::{Query, State};
use axum::Json;

use crate::api::{AppState, IdentityQuery};
use crate::domain::ServiceListing;
use crate::engine::lifecycle::BookingPartitions;
use crate::engine::summary::ProviderSummary;
use crate::error::AppError;

pub async fn get_bookings(
    Query(params): Query<IdentityQuery>,
    State(state): State<AppState>,
) -> Result<Json<BookingPartitions>, AppError> {
    let identity = params.require_identity()?;
    Ok(Json(state.marketplace.provider_bookings(&identity).await))
}

pub async fn get_services(
    Query(params): Query<IdentityQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceListing>>, AppError> {
    let identity = params.require_identity()?;
    Ok(Json(state.marketplace.provider_services(&identity).await))
}

pub async fn get_summary(
    Query(params): Query<IdentityQuery>,
    State(state): State<AppState>,
) -> Result<Json<ProviderSummary>, AppError> {
    let identity = params.require_identity()?;
    Ok(Json(state.marketplace.provider_summary(&identity).await))
}
