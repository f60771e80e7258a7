//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use domain::CatalogFilter;
use serde::{Deserialize, Serialize};
use storage::{Product, ProductStore, ProductType};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{Caller, parse_user_id};

/// Highest unit price a product may be listed at: ₦1,000,000,000.00.
pub const MAX_PRICE: Money = Money::from_minor(100_000_000_000);

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    #[serde(rename = "type")]
    pub product_type: Option<ProductType>,
    pub category: Option<String>,
    pub farmer_id: Option<String>,
    pub q: Option<String>,
}

/// A price given either in minor units or as a display string such as
/// `"₦1,250.50"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Minor(i64),
    Display(String),
}

impl PriceInput {
    fn to_money(&self) -> Result<Money, ApiError> {
        match self {
            PriceInput::Minor(minor) => Ok(Money::from_minor(*minor)),
            PriceInput::Display(raw) => {
                Money::parse_display(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub price: PriceInput,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub price_display: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            price_display: product.price.to_string(),
            product,
        }
    }
}

// -- Handlers --

/// GET /products: active products matching the query, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let filter = CatalogFilter {
        product_type: query.product_type,
        category: query.category,
        farmer_id: query.farmer_id.as_deref().map(parse_user_id).transpose()?,
        search: query.q,
    };
    let products = domain::browse(state.service.products(), &filter).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// POST /products: the caller lists a new product as its farmer.
#[tracing::instrument(skip(state, req), fields(farmer_id = %caller.0))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Product name is required".into()));
    }
    let category = req.category.trim();
    if category.is_empty() {
        return Err(ApiError::BadRequest("Product category is required".into()));
    }
    let price = req.price.to_money()?;
    if !price.is_positive() {
        return Err(ApiError::BadRequest(format!(
            "Price must be greater than zero, got {price}"
        )));
    }
    if price > MAX_PRICE {
        return Err(ApiError::BadRequest(format!(
            "Price must not exceed {MAX_PRICE}, got {price}"
        )));
    }

    let mut product = Product::new(
        ProductId::new(uuid::Uuid::new_v4().to_string()),
        caller.0,
        name,
        category,
        req.product_type,
        price,
        req.quantity,
    );
    if let Some(subcategory) = req.subcategory {
        product = product.with_subcategory(subcategory);
    }
    if let Some(description) = req.description {
        product = product.with_description(description);
    }
    if let Some(image_url) = req.image_url {
        product = product.with_image_url(image_url);
    }

    state.service.products().insert(product.clone()).await?;
    tracing::info!(product_id = %product.id, "product listed");
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// DELETE /products/:id: the owning farmer withdraws a product.
#[tracing::instrument(skip(state))]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    domain::withdraw(state.service.products(), caller.0, &ProductId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
