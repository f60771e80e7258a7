//! Farmer sales summary.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::FarmerSalesSummary;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{Caller, parse_user_id};

/// GET /farmers/:id/sales: visible only to that farmer.
#[tracing::instrument(skip(state))]
pub async fn summary(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<FarmerSalesSummary>, ApiError> {
    let farmer_id = parse_user_id(&id)?;
    let summary = state.service.sales_summary(caller.0, farmer_id).await?;
    Ok(Json(summary))
}
