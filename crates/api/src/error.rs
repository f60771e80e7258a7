//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use storage::StorageError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// The caller did not identify themselves.
    #[error("Missing x-user-id header")]
    Unauthenticated,

    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Domain(err) => domain_status(err),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::EmptyCart
        | DomainError::MixedFarmer { .. }
        | DomainError::InvalidQuantity { .. }
        | DomainError::AmountOverflow { .. } => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InvalidStateTransition { .. }
        | DomainError::InventoryUpdate { .. }
        | DomainError::ReceiptUnavailable { .. } => StatusCode::CONFLICT,
        DomainError::Storage(err) => storage_status(err),
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::Duplicate { .. }
        | StorageError::InsufficientStock { .. }
        | StorageError::ProductInactive(_)
        | StorageError::StatusConflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Domain(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{RequestId, RequestStatus, UserId};

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (DomainError::EmptyCart, StatusCode::BAD_REQUEST),
            (
                DomainError::AmountOverflow {
                    context: "cart total",
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::InvalidQuantity { quantity: 0 },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::Unauthorized {
                    user_id: UserId::new(),
                    action: "accept",
                },
                StatusCode::FORBIDDEN,
            ),
            (
                DomainError::InvalidStateTransition {
                    current: RequestStatus::Pending,
                    action: "pay",
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::ReceiptUnavailable {
                    id: RequestId::new(),
                    status: RequestStatus::Accepted,
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::Storage(StorageError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(domain_status(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_duplicate_product_is_conflict() {
        let err = ApiError::from(StorageError::Duplicate {
            entity: "Product",
            id: "P1".into(),
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_missing_caller_is_unauthorized() {
        let response = ApiError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
