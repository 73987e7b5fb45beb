use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::error::ApiError;
use crate::identity::IdentityError;
use crate::profiles::schema::Role;
use crate::state::AppState;
use crate::store::{StoreError, UserRow};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with upper, lower, digit and one of `@$!%*?&`.
pub(crate) fn is_strong_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| "@$!%*?&".contains(c))
}

/// Credential check via the identity provider, then the email-verified gate.
/// Both are required; each failure maps to a distinct Unauthorized message.
#[instrument(skip(state, password))]
pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(String, UserRow), ApiError> {
    let email = email.trim().to_lowercase();

    let identity = match state.identity.sign_in(&email, password).await {
        Ok(identity) => identity,
        Err(IdentityError::InvalidCredentials) | Err(IdentityError::NotFound) => {
            warn!("login with invalid credentials");
            return Err(ApiError::Unauthorized("invalid email or password"));
        }
        Err(e) => {
            return Err(ApiError::Upstream {
                collaborator: "identity provider",
                source: e.into(),
            })
        }
    };

    let user = state
        .store
        .find_user_by_id(identity.id)
        .await
        .map_err(ApiError::upstream("profile store"))?
        .ok_or(ApiError::Unauthorized("account not found"))?;

    if !user.is_email_verified {
        warn!(user_id = %user.id, "unverified user attempted login");
        return Err(ApiError::Unauthorized(
            "please verify your email before logging in",
        ));
    }

    let keys = JwtKeys::from_config(&state.config.jwt);
    let token = keys.sign_access(user.id, &user.email)?;

    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

#[derive(Debug)]
pub struct VerifiedEmail {
    pub user_id: Uuid,
    pub email: String,
    pub already_verified: bool,
}

/// Decode a self-issued verification token and flip the verified flag.
/// The false-to-true transition happens at most once; verifying an already
/// verified user succeeds without a write.
#[instrument(skip(state, token))]
pub async fn verify_email(state: &AppState, token: &str) -> Result<VerifiedEmail, ApiError> {
    let keys = JwtKeys::from_config(&state.config.jwt);
    let claims = keys
        .verify_email_token(token)
        .map_err(|_| ApiError::Unauthorized("invalid or expired verification token"))?;

    let user = state
        .store
        .find_user_by_id(claims.sub)
        .await
        .map_err(ApiError::upstream("profile store"))?
        .ok_or(ApiError::Unauthorized("account not found"))?;

    if user.is_email_verified {
        return Ok(VerifiedEmail {
            user_id: user.id,
            email: user.email,
            already_verified: true,
        });
    }

    // Provider first: the users row gates the idempotency check above, so it
    // must flip last or a provider failure would never be retried.
    state
        .identity
        .mark_email_verified(user.id)
        .await
        .map_err(ApiError::upstream("identity provider"))?;
    state
        .store
        .set_email_verified(user.id)
        .await
        .map_err(ApiError::upstream("profile store"))?;

    info!(user_id = %user.id, "email verified");
    Ok(VerifiedEmail {
        user_id: user.id,
        email: user.email,
        already_verified: false,
    })
}

/// Explicit add-role operation; not part of registration. Does NOT reshape
/// the existing profile row, which keeps the shape assigned at creation.
#[instrument(skip(state))]
pub async fn add_role(state: &AppState, user_id: Uuid, role: Role) -> Result<(), ApiError> {
    match state.store.insert_role(user_id, role).await {
        Ok(()) => {
            info!(user_id = %user_id, role = %role, "role added");
            Ok(())
        }
        Err(StoreError::Duplicate) => Err(ApiError::Conflict(format!(
            "user {user_id} already holds role {role}"
        ))),
        Err(e) => Err(ApiError::upstream("profile store")(e)),
    }
}

/// Non-erroring role check for handler guards.
pub async fn has_role(state: &AppState, user_id: Uuid, role: Role) -> bool {
    match state.store.roles_for(user_id).await {
        Ok(roles) => roles.contains(&role),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "role lookup failed");
            false
        }
    }
}
