use axum::{
    extract::State,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use crate::{
    auth::{jwt::AuthUser, services::has_role},
    error::ApiError,
    profiles::dto::{OnboardingRequest, OnboardingResponse, ProfileResponse},
    profiles::services,
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/me", get(me))
        .route("/profile/onboarding", post(complete_onboarding))
        .route("/profile", patch(update_profile))
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    Ok(Json(services::get_profile(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
async fn complete_onboarding(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<OnboardingRequest>,
) -> Result<Json<OnboardingResponse>, ApiError> {
    // The payload is validated against a role the user actually holds.
    if !has_role(&state, user_id, payload.role).await {
        warn!(user_id = %user_id, role = %payload.role, "onboarding for unheld role");
        return Err(ApiError::Unauthorized("role not assigned to this user"));
    }
    services::complete_onboarding(&state, user_id, payload.role, payload.fields).await?;
    Ok(Json(OnboardingResponse {
        message: "onboarding completed",
    }))
}

#[instrument(skip(state, patch))]
async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<OnboardingResponse>, ApiError> {
    services::update_profile(&state, user_id, patch).await?;
    Ok(Json(OnboardingResponse {
        message: "profile updated",
    }))
}
