//! Stores for the marketplace: profiles, products and purchase requests.
//!
//! Each store is a trait with an in-memory implementation (tests, local runs)
//! and a PostgreSQL implementation backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use error::{Result, StorageError};
pub use memory::{InMemoryProductStore, InMemoryProfileDirectory, InMemoryPurchaseRequestRepository};
pub use postgres::{PostgresProductStore, PostgresProfileDirectory, PostgresPurchaseRequestRepository};
pub use query::Page;
pub use records::{
    LineItem, Product, ProductType, Profile, PurchaseRequest, StockLevel, StockMovement, UserType,
};
pub use store::{ProductStore, ProfileDirectory, PurchaseRequestRepository};
