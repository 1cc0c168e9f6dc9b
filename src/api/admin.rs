//! Administrator dashboard, exports and reconciliation queue.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::AppState;
use crate::datasource::Collection;
use crate::domain::RecordId;
use crate::engine::summary::DashboardSummary;
use crate::error::AppError;
use crate::orchestration::PendingWrite;
use crate::report::write_bookings_csv;

pub async fn get_summary(State(state): State<AppState>) -> Json<DashboardSummary> {
    Json(state.marketplace.admin_summary().await)
}

pub async fn get_bookings_csv(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut bookings = state.marketplace.all_bookings().await;
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut out = Vec::new();
    write_bookings_csv(&bookings, &mut out)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"bookings.csv\"",
            ),
        ],
        out,
    ))
}

pub async fn get_reconciliation(State(state): State<AppState>) -> Json<Vec<PendingWrite>> {
    Json(state.marketplace.needs_reconciliation().await)
}

pub async fn discard_pending(
    Path((collection, id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let collection = Collection::ALL
        .into_iter()
        .find(|c| c.as_str() == collection)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown collection: {}", collection)))?;

    if state
        .marketplace
        .discard(collection, &RecordId::new(id.clone()))
        .await
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No pending write for {}/{}", collection, id)))
    }
}
