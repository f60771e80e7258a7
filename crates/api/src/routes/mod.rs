//! HTTP handlers, one module per resource.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod products;
pub mod profile;
pub mod purchase_requests;
pub mod sales;
