//! Cart endpoints. Each user has one server-held cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, ProductId, UserId};
use domain::{Cart, CartItem};
use serde::{Deserialize, Serialize};
use storage::{ProductStore, PurchaseRequest};
use tokio::sync::Mutex;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::Caller;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub message: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub farmer_id: Option<UserId>,
    pub total_items: u32,
    pub total_price: Money,
    pub total_display: String,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        let total_price = cart.total_price();
        Self {
            items: cart.items().to_vec(),
            farmer_id: cart.farmer_id(),
            total_items: cart.total_item_count(),
            total_price,
            total_display: total_price.to_string(),
        }
    }
}

// -- Handlers --

/// GET /cart: a user without a cart sees an empty one.
#[tracing::instrument(skip(state))]
pub async fn view(State(state): State<Arc<AppState>>, caller: Caller) -> Json<CartResponse> {
    let Some(cart) = state.carts.peek(caller.0).await else {
        return Json(CartResponse::from(&Cart::new()));
    };
    let response = CartResponse::from(&*cart.lock().await);
    state.carts.release(caller.0, cart).await;
    Json(response)
}

/// POST /cart/items: adds an active product from the catalog.
#[tracing::instrument(skip(state))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id = ProductId::new(req.product_id);
    let product = state
        .service
        .products()
        .get(&product_id)
        .await?
        .filter(|product| product.is_active)
        .ok_or_else(|| ApiError::NotFound(format!("Product {product_id} not found")))?;

    let cart = state.carts.cart(caller.0).await;
    let result = {
        let mut guard = cart.lock().await;
        guard
            .add_item(CartItem::from(&product), req.quantity)
            .map(|()| CartResponse::from(&*guard))
    };
    state.carts.release(caller.0, cart).await;
    Ok(Json(result?))
}

/// PATCH /cart/items/:product_id: sets the quantity; zero or less removes the
/// item.
#[tracing::instrument(skip(state))]
pub async fn update_quantity(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let not_in_cart = || ApiError::NotFound(format!("Product {product_id} is not in the cart"));
    let Some(cart) = state.carts.peek(caller.0).await else {
        return Err(not_in_cart());
    };
    let result = {
        let mut guard = cart.lock().await;
        guard
            .update_quantity(&ProductId::new(product_id.as_str()), req.quantity)
            .map(|found| found.then(|| CartResponse::from(&*guard)))
    };
    state.carts.release(caller.0, cart).await;
    result?.map(Json).ok_or_else(not_in_cart)
}

/// DELETE /cart/items/:product_id: removing an absent item is not an error.
#[tracing::instrument(skip(state))]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(product_id): Path<String>,
) -> Json<CartResponse> {
    let Some(cart) = state.carts.peek(caller.0).await else {
        tracing::debug!("no cart to remove from");
        return Json(CartResponse::from(&Cart::new()));
    };
    let response = {
        let mut guard = cart.lock().await;
        if !guard.remove_item(&ProductId::new(product_id)) {
            tracing::debug!("item was not in the cart");
        }
        CartResponse::from(&*guard)
    };
    state.carts.release(caller.0, cart).await;
    Json(response)
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear(State(state): State<Arc<AppState>>, caller: Caller) -> Json<CartResponse> {
    if let Some(cart) = state.carts.peek(caller.0).await {
        cart.lock().await.clear();
        state.carts.release(caller.0, cart).await;
    }
    Json(CartResponse::from(&Cart::new()))
}

/// POST /cart/checkout: turns the cart into a pending purchase request.
///
/// The cart is cleared only once the request has been stored.
#[tracing::instrument(skip(state, req))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PurchaseRequest>), ApiError> {
    let Some(cart) = state.carts.peek(caller.0).await else {
        return Err(domain::DomainError::EmptyCart.into());
    };
    let result = place_request(&state, caller.0, &cart, req.message).await;
    state.carts.release(caller.0, cart).await;
    let request = result?;

    metrics::counter!("cart_checkouts_total").increment(1);
    Ok((StatusCode::CREATED, Json(request)))
}

async fn place_request(
    state: &AppState,
    caller: UserId,
    cart: &Mutex<Cart>,
    message: Option<String>,
) -> Result<PurchaseRequest, ApiError> {
    let mut cart = cart.lock().await;
    let new_request = cart.checkout(caller, message)?;
    let request = state.service.create(caller, new_request).await?;
    cart.clear();
    Ok(request)
}
