use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    profiles::dto::OnboardingResponse,
    profiles::schema::Role,
    profiles::services::complete_onboarding,
    state::AppState,
    uploads::services::{classify_and_store, UploadItem},
};

const MAX_FILES: usize = 10;
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile/onboarding-with-files",
            post(onboarding_with_files),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// Multipart onboarding: `files` parts are classified and uploaded, every
/// other part is a form field. The resulting field-to-URL mapping is merged
/// over the form payload before the normal onboarding validation runs, so
/// document URLs coming from this very request can satisfy required fields.
#[instrument(skip(state, multipart))]
async fn onboarding_with_files(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<OnboardingResponse>, ApiError> {
    let mut files: Vec<UploadItem> = Vec::new();
    let mut payload: Map<String, Value> = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "files" || name == "files[]" {
            let filename = field
                .file_name()
                .ok_or_else(|| ApiError::BadRequest("file part without a filename".into()))?
                .to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("unreadable file part: {e}")))?;
            files.push(UploadItem {
                filename,
                content_type,
                body,
            });
        } else if !name.is_empty() {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("unreadable form field: {e}")))?;
            // Form values arrive as text; arrays and numbers come JSON-encoded.
            let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
            payload.insert(name, value);
        }
    }

    if files.len() > MAX_FILES {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_FILES} files per request"
        )));
    }

    // Some clients echo the role as a form field; the role is resolved from
    // the store below, not trusted from the body.
    payload.remove("role");

    let uploaded = classify_and_store(&state, user_id, files).await?;
    payload.extend(uploaded);

    // Lister wins when both roles are held, mirroring the onboarding form.
    let roles = state
        .store
        .roles_for(user_id)
        .await
        .map_err(ApiError::upstream("profile store"))?;
    if roles.is_empty() {
        warn!(user_id = %user_id, "onboarding without any role");
        return Err(ApiError::Unauthorized("no role assigned to this user"));
    }
    let role = if roles.contains(&Role::Lister) {
        Role::Lister
    } else {
        Role::Candidate
    };

    complete_onboarding(&state, user_id, role, payload).await?;
    Ok(Json(OnboardingResponse {
        message: "onboarding completed",
    }))
}
