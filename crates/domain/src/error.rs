//! Domain error types.

use common::{ProductId, RequestId, RequestStatus, UserId};
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur during cart and purchase request operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Checkout or request creation with no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// An item from a second farmer was added to a cart.
    #[error("Cart holds items from farmer {expected}; cannot add an item from farmer {found}")]
    MixedFarmer { expected: UserId, found: UserId },

    /// Quantity must be greater than zero.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i64 },

    /// A quantity or price total does not fit the supported range.
    #[error("Amount overflow: {context} exceeds the supported range")]
    AmountOverflow { context: &'static str },

    /// The request is not in the status the operation requires.
    #[error("Invalid state transition: cannot {action} from {current} state")]
    InvalidStateTransition {
        current: RequestStatus,
        action: &'static str,
    },

    /// The caller is not the party allowed to perform the operation.
    #[error("User {user_id} is not allowed to {action}")]
    Unauthorized {
        user_id: UserId,
        action: &'static str,
    },

    /// Stock for a line could not be decremented; nothing was changed.
    #[error("Inventory update failed for product {product_id}: {reason}")]
    InventoryUpdate {
        product_id: ProductId,
        reason: String,
    },

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Receipts exist only for paid requests.
    #[error("No receipt for purchase request {id}: status is {status}")]
    ReceiptUnavailable { id: RequestId, status: RequestStatus },

    /// An error occurred in a store.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DomainError {
    pub(crate) fn request_not_found(id: RequestId) -> Self {
        DomainError::NotFound {
            entity: "PurchaseRequest",
            id: id.to_string(),
        }
    }

    pub(crate) fn product_not_found(id: &ProductId) -> Self {
        DomainError::NotFound {
            entity: "Product",
            id: id.to_string(),
        }
    }

    /// Maps a store failure during a status change to the caller-facing error.
    pub(crate) fn from_transition(err: StorageError, action: &'static str) -> Self {
        match err {
            StorageError::StatusConflict { actual, .. } => DomainError::InvalidStateTransition {
                current: actual,
                action,
            },
            StorageError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            other => DomainError::Storage(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
