//! HTTP API server with observability for the AgroConnect marketplace.
//!
//! Provides REST endpoints for the catalog, carts and purchase requests,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use domain::PurchaseRequestService;
use metrics_exporter_prometheus::PrometheusHandle;
use storage::{
    InMemoryProductStore, InMemoryProfileDirectory, InMemoryPurchaseRequestRepository,
    ProductStore, ProfileDirectory, PurchaseRequestRepository,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use session::CartSessions;

/// The purchase request service over whichever stores the server runs with.
pub type Service = PurchaseRequestService<
    Arc<dyn PurchaseRequestRepository>,
    Arc<dyn ProductStore>,
    Arc<dyn ProfileDirectory>,
>;

/// The stores backing the server.
#[derive(Clone)]
pub struct Stores {
    pub requests: Arc<dyn PurchaseRequestRepository>,
    pub products: Arc<dyn ProductStore>,
    pub profiles: Arc<dyn ProfileDirectory>,
}

impl Stores {
    /// Empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            requests: Arc::new(InMemoryPurchaseRequestRepository::new()),
            products: Arc::new(InMemoryProductStore::new()),
            profiles: Arc::new(InMemoryProfileDirectory::new()),
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub service: Service,
    pub carts: CartSessions,
}

/// Creates the application state over the given stores.
pub fn create_state(stores: Stores) -> Arc<AppState> {
    Arc::new(AppState {
        service: PurchaseRequestService::new(stores.requests, stores.products, stores.profiles),
        carts: CartSessions::new(),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products",
            get(routes::products::list).post(routes::products::create),
        )
        .route("/products/{id}", delete(routes::products::withdraw))
        .route(
            "/profile",
            get(routes::profile::get).put(routes::profile::upsert),
        )
        .route("/cart", get(routes::cart::view).delete(routes::cart::clear))
        .route("/cart/items", post(routes::cart::add_item))
        .route(
            "/cart/items/{product_id}",
            patch(routes::cart::update_quantity).delete(routes::cart::remove_item),
        )
        .route("/cart/checkout", post(routes::cart::checkout))
        .route("/purchase-requests", get(routes::purchase_requests::list))
        .route(
            "/purchase-requests/{id}",
            get(routes::purchase_requests::get).delete(routes::purchase_requests::delete),
        )
        .route(
            "/purchase-requests/{id}/accept",
            post(routes::purchase_requests::accept),
        )
        .route(
            "/purchase-requests/{id}/reject",
            post(routes::purchase_requests::reject),
        )
        .route(
            "/purchase-requests/{id}/pay",
            post(routes::purchase_requests::pay),
        )
        .route(
            "/purchase-requests/{id}/receipt",
            get(routes::purchase_requests::receipt),
        )
        .route("/farmers/{id}/sales", get(routes::sales::summary))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
