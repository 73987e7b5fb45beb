use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AddRoleRequest, AuthResponse, LoginRequest, PublicUser, RegisterRequest,
            RegisterResponse, VerifyEmailRequest, VerifyEmailResponse,
        },
        jwt::{AuthUser, JwtKeys},
        registration, services,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/roles", post(add_role))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let out = registration::register(&state, payload).await?;

    // Stand-in for the emailed confirmation link.
    let keys = JwtKeys::from_ref(&state);
    let verification_token = keys.sign_verify(out.user_id, &out.email)?;

    Ok(Json(RegisterResponse {
        message: "registration successful; verify your email to activate the account",
        user_id: out.user_id,
        role: out.role,
        email: out.email,
        verification_token,
        redirect_to: format!("{}/auth/confirm-email", state.config.frontend_url),
    }))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (access_token, user) = services::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(AuthResponse {
        access_token,
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    }))
}

#[instrument(skip(state, payload))]
async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<VerifyEmailResponse>, ApiError> {
    let out = services::verify_email(&state, &payload.token).await?;
    Ok(Json(VerifyEmailResponse {
        user: PublicUser {
            id: out.user_id,
            email: out.email,
        },
        verified: true,
        redirect_to: format!("{}/dashboard", state.config.frontend_url),
    }))
}

#[instrument(skip(state, payload))]
async fn add_role(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AddRoleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services::add_role(&state, user_id, payload.role).await?;
    Ok(Json(serde_json::json!({ "message": "role added" })))
}
