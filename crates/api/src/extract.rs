//! Request extractors and path parsing.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{RequestId, UserId};

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user making the request, taken from the [`USER_ID_HEADER`] header.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(ApiError::Unauthenticated)?;
        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header")))?;
        let user_id = UserId::parse(raw.trim())
            .map_err(|e| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header: {e}")))?;
        Ok(Caller(user_id))
    }
}

pub(crate) fn parse_request_id(raw: &str) -> Result<RequestId, ApiError> {
    RequestId::parse(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid purchase request id: {e}")))
}

pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|e| ApiError::BadRequest(format!("Invalid user id: {e}")))
}
