use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::dto::RegisterRequest;
use crate::auth::services::{is_strong_password, is_valid_email};
use crate::error::ApiError;
use crate::identity::IdentityError;
use crate::profiles::schema::{default_profile, Role};
use crate::state::AppState;
use crate::store::StoreError;

/// The relational writes that can fail after the identity exists. Earlier
/// failures surface as `Conflict` or `Upstream` and need no compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    InsertUser,
    InsertRole,
    InsertProfile,
}

impl RegistrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStep::InsertUser => "insert_user",
            RegistrationStep::InsertRole => "insert_role",
            RegistrationStep::InsertProfile => "insert_profile",
        }
    }
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Compensation<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Compensation stack for a multi-store write sequence without transactions.
/// Each successful forward action pushes its undo; on failure the stack
/// unwinds in reverse order. Undo failures are collected as diagnostics, not
/// propagated: the caller's error kind stays the forward failure.
struct Saga<'a> {
    undo: Vec<(&'static str, Compensation<'a>)>,
}

impl<'a> Saga<'a> {
    fn new() -> Self {
        Self { undo: Vec::new() }
    }

    fn push(&mut self, name: &'static str, compensation: Compensation<'a>) {
        self.undo.push((name, compensation));
    }

    async fn unwind(self) -> Vec<String> {
        let mut notes = Vec::new();
        for (name, compensation) in self.undo.into_iter().rev() {
            match compensation.await {
                Ok(()) => info!(action = name, "rollback action completed"),
                Err(e) => {
                    // Orphaned state: needs operator attention.
                    error!(action = name, error = %format!("{e:#}"), "rollback action failed");
                    notes.push(format!("{name}: {e:#}"));
                }
            }
        }
        notes
    }
}

/// Result of a fully provisioned registration.
#[derive(Debug)]
pub struct NewRegistration {
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
}

/// Provision a new user: identity, user row, role assignment, profile row.
/// The three relational writes have no shared transaction; any failure after
/// identity creation triggers best-effort rollback of everything already
/// written in this attempt, so a retry with the same email is not blocked by
/// a half-provisioned user.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<NewRegistration, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!("invalid email");
        return Err(ApiError::BadRequest("invalid email".into()));
    }
    if !is_strong_password(&req.password) {
        warn!("weak password");
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters with upper, lower, digit and special".into(),
        ));
    }
    let role = req.role.unwrap_or(Role::Candidate);

    // Step 1: reject an email that already finished provisioning. Races on
    // this check are closed by the identity store's unique key below.
    if state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(ApiError::upstream("profile store"))?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "user with email {email} already exists"
        )));
    }

    // Step 2: create the identity.
    let identity = match state
        .identity
        .sign_up(&email, &req.password, &req.first_name, &req.last_name)
        .await
    {
        Ok(identity) => identity,
        Err(IdentityError::Conflict) => {
            return Err(ApiError::Conflict(format!(
                "identity for {email} already exists"
            )))
        }
        Err(e) => {
            return Err(ApiError::Upstream {
                collaborator: "identity provider",
                source: e.into(),
            })
        }
    };
    let user_id = identity.id;

    let mut saga = Saga::new();
    saga.push(
        "delete identity",
        Box::pin(async move {
            state
                .identity
                .delete_identity(user_id)
                .await
                .map_err(anyhow::Error::from)
        }),
    );

    // Step 3: mirror the identity into the users table.
    if let Err(e) = state
        .store
        .insert_user(user_id, &email, &req.first_name, &req.last_name)
        .await
    {
        let notes = saga.unwind().await;
        return Err(match e {
            StoreError::Duplicate => {
                ApiError::Conflict(format!("user row for {email} already exists"))
            }
            e => ApiError::Provisioning {
                step: RegistrationStep::InsertUser,
                rollback_notes: notes,
                source: e.into(),
            },
        });
    }
    saga.push(
        "delete user row",
        Box::pin(async move {
            state
                .store
                .delete_user(user_id)
                .await
                .map_err(anyhow::Error::from)
        }),
    );

    // Step 4: role assignment.
    if let Err(e) = state.store.insert_role(user_id, role).await {
        let notes = saga.unwind().await;
        return Err(ApiError::Provisioning {
            step: RegistrationStep::InsertRole,
            rollback_notes: notes,
            source: e.into(),
        });
    }
    saga.push(
        "delete role assignments",
        Box::pin(async move {
            state
                .store
                .delete_roles(user_id)
                .await
                .map_err(anyhow::Error::from)
        }),
    );

    // Step 5: profile row, shaped once by the assigned role.
    let profile = default_profile(user_id, role);
    if let Err(e) = state.store.insert_profile(&profile).await {
        let notes = saga.unwind().await;
        return Err(ApiError::Provisioning {
            step: RegistrationStep::InsertProfile,
            rollback_notes: notes,
            source: e.into(),
        });
    }

    info!(user_id = %user_id, role = %role, "user registered");
    Ok(NewRegistration {
        user_id,
        role,
        email,
    })
}
