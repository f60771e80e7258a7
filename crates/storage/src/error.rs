use common::{ProductId, RequestId, RequestStatus};
use thiserror::Error;

/// Errors that can occur when interacting with the marketplace stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A record with the same key already exists.
    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: String },

    /// The product does not have enough stock for the movement.
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// The product has been deactivated.
    #[error("Product {0} is no longer active")]
    ProductInactive(ProductId),

    /// A conditional status update or delete found the request in another status.
    #[error("Purchase request {id} is {actual}")]
    StatusConflict { id: RequestId, actual: RequestStatus },

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be mapped back to a record.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn product_not_found(id: &ProductId) -> Self {
        StorageError::NotFound {
            entity: "Product",
            id: id.to_string(),
        }
    }

    pub(crate) fn request_not_found(id: RequestId) -> Self {
        StorageError::NotFound {
            entity: "PurchaseRequest",
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;
