//! The caller's own profile.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use storage::{Profile, ProfileDirectory, UserType};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::Caller;

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub full_name: Option<String>,
    pub email: String,
    pub user_type: UserType,
    pub address: Option<String>,
}

/// GET /profile
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .service
        .profiles()
        .get(caller.0)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Profile {} not found", caller.0)))?;
    Ok(Json(profile))
}

/// PUT /profile: creates or replaces the caller's profile.
#[tracing::instrument(skip(state, req))]
pub async fn upsert(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(ApiError::BadRequest(format!("Invalid email: {email:?}")));
    }

    let mut profile = Profile::new(caller.0, email, req.user_type);
    if let Some(full_name) = non_blank(req.full_name) {
        profile = profile.with_full_name(full_name);
    }
    if let Some(address) = non_blank(req.address) {
        profile = profile.with_address(address);
    }

    state.service.profiles().upsert(profile.clone()).await?;
    Ok(Json(profile))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
