use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::Decimal;
use crate::engine::money::{parse_price_str, CommissionBreakdown};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionQuery {
    pub base_price: Option<String>,
    pub rate: Option<String>,
}

/// Quote for a base price. Unparsable prices quote as zero; a malformed rate
/// is rejected.
pub async fn get_commission(
    Query(params): Query<CommissionQuery>,
    State(state): State<AppState>,
) -> Result<Json<CommissionBreakdown>, AppError> {
    let base_price = parse_price_str(params.base_price.as_deref().unwrap_or(""));
    let rate = params
        .rate
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Decimal::from_str_canonical)
        .transpose()
        .map_err(|_| AppError::BadRequest("Invalid rate".to_string()))?;

    Ok(Json(state.marketplace.quote(base_price, rate)))
}
