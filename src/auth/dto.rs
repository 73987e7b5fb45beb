use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::profiles::schema::Role;

/// Request body for user registration. Role defaults to candidate.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for email verification.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Request body for adding a role to the authenticated user.
#[derive(Debug, Deserialize)]
pub struct AddRoleRequest {
    pub role: Role,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
}

/// Response returned after registration. The verification token stands in
/// for the emailed confirmation link.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
    pub verification_token: String,
    pub redirect_to: String,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: PublicUser,
}

/// Response returned after email verification; idempotent across calls.
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub user: PublicUser,
    pub verified: bool,
    pub redirect_to: String,
}

/// User header block inside the profile response.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub is_email_verified: bool,
    pub created_at: OffsetDateTime,
}
