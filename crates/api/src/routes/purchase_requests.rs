//! Purchase request endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use common::{Money, ProductId};
use domain::{DetailLine, PurchaseRequestDetails};
use serde::{Deserialize, Serialize};
use storage::{Page, Profile, PurchaseRequest};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{Caller, parse_request_id};

// -- Request types --

/// Which side of the requests to list.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Farmer,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
pub struct LineResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl From<&DetailLine> for LineResponse {
    fn from(line: &DetailLine) -> Self {
        Self {
            product_id: line.item.product_id.clone(),
            product_name: line.product_name(),
            quantity: line.item.quantity,
            unit_price: line.item.unit_price,
            line_total: line.line_total(),
        }
    }
}

#[derive(Serialize)]
pub struct PurchaseRequestResponse {
    #[serde(flatten)]
    pub request: PurchaseRequest,
    pub total_display: String,
    pub customer: Option<Profile>,
    pub farmer: Option<Profile>,
    pub lines: Vec<LineResponse>,
}

impl From<PurchaseRequestDetails> for PurchaseRequestResponse {
    fn from(details: PurchaseRequestDetails) -> Self {
        Self {
            total_display: details.request.total_amount.to_string(),
            lines: details.lines.iter().map(LineResponse::from).collect(),
            request: details.request,
            customer: details.customer,
            farmer: details.farmer,
        }
    }
}

// -- Handlers --

/// GET /purchase-requests: the caller's requests as customer (default) or
/// farmer, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PurchaseRequestResponse>>, ApiError> {
    let page = Page {
        offset: query.offset,
        limit: query.limit,
    };
    let requests = match query.role {
        Role::Customer => state.service.list_for_customer(caller.0, page).await?,
        Role::Farmer => state.service.list_for_farmer(caller.0, page).await?,
    };
    let details = state.service.with_details(requests).await?;
    Ok(Json(
        details.into_iter().map(PurchaseRequestResponse::from).collect(),
    ))
}

/// GET /purchase-requests/:id
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<PurchaseRequestResponse>, ApiError> {
    let id = parse_request_id(&id)?;
    let details = state.service.details(caller.0, id).await?;
    Ok(Json(details.into()))
}

/// POST /purchase-requests/:id/accept
#[tracing::instrument(skip(state))]
pub async fn accept(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<PurchaseRequest>, ApiError> {
    let id = parse_request_id(&id)?;
    Ok(Json(state.service.accept(caller.0, id).await?))
}

/// POST /purchase-requests/:id/reject
#[tracing::instrument(skip(state))]
pub async fn reject(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<PurchaseRequest>, ApiError> {
    let id = parse_request_id(&id)?;
    Ok(Json(state.service.reject(caller.0, id).await?))
}

/// POST /purchase-requests/:id/pay: settles inventory and marks the request
/// paid.
#[tracing::instrument(skip(state))]
pub async fn pay(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<PurchaseRequest>, ApiError> {
    let id = parse_request_id(&id)?;
    Ok(Json(state.service.pay(caller.0, id).await?))
}

/// DELETE /purchase-requests/:id
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_request_id(&id)?;
    state.service.delete(caller.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /purchase-requests/:id/receipt: plain-text receipt of a paid request.
#[tracing::instrument(skip(state))]
pub async fn receipt(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_request_id(&id)?;
    let receipt = state.service.receipt(caller.0, id).await?;
    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        receipt.to_string(),
    ))
}
