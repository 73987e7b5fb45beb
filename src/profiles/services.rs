use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::dto::UserInfo;
use crate::error::ApiError;
use crate::profiles::dto::ProfileResponse;
use crate::profiles::schema::{
    is_known_field, required_onboarding_fields, role_fields, Role, COMMON_FIELDS,
};
use crate::state::AppState;

/// A required field is unsatisfied when absent, null or an empty string.
/// Empty arrays pass: array-valued fields start as `[]`.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Batch check against the registry's required set; returns every missing
/// field, not just the first.
pub fn missing_required_fields(role: Role, payload: &Map<String, Value>) -> Vec<String> {
    required_onboarding_fields(role)
        .into_iter()
        .filter(|field| is_missing(payload.get(*field)))
        .map(str::to_string)
        .collect()
}

/// The profile bag is a closed schema; reject names no role carries. This
/// also keeps `is_onboarded` out of reach of payloads.
fn ensure_known_fields(payload: &Map<String, Value>) -> Result<(), ApiError> {
    for name in payload.keys() {
        if !is_known_field(name) {
            return Err(ApiError::BadRequest(format!("unknown field: {name}")));
        }
    }
    Ok(())
}

/// Validate the one-time onboarding submission for the role and persist it,
/// flipping `is_onboarded`. The write is a merge: fields not present in the
/// payload keep their stored value.
#[instrument(skip(state, payload))]
pub async fn complete_onboarding(
    state: &AppState,
    user_id: Uuid,
    role: Role,
    payload: Map<String, Value>,
) -> Result<(), ApiError> {
    ensure_known_fields(&payload)?;

    let missing = missing_required_fields(role, &payload);
    if !missing.is_empty() {
        return Err(ApiError::Validation {
            missing_fields: missing,
        });
    }

    state
        .store
        .merge_profile(user_id, &payload, true)
        .await
        .map_err(ApiError::upstream("profile store"))?;

    info!(user_id = %user_id, role = %role, "onboarding completed");
    Ok(())
}

/// Partial update; always allowed, never touches `is_onboarded`.
#[instrument(skip(state, patch))]
pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    patch: Map<String, Value>,
) -> Result<(), ApiError> {
    ensure_known_fields(&patch)?;
    state
        .store
        .merge_profile(user_id, &patch, false)
        .await
        .map_err(ApiError::upstream("profile store"))?;
    info!(user_id = %user_id, "profile updated");
    Ok(())
}

/// Profile view for the authenticated user: role-specific blocks first for
/// every held role, then the common block, then the onboarding flag.
#[instrument(skip(state))]
pub async fn get_profile(state: &AppState, user_id: Uuid) -> Result<ProfileResponse, ApiError> {
    let user = state
        .store
        .find_user_by_id(user_id)
        .await
        .map_err(ApiError::upstream("profile store"))?
        .ok_or(ApiError::Unauthorized("account not found"))?;

    let roles = state
        .store
        .roles_for(user_id)
        .await
        .map_err(ApiError::upstream("profile store"))?;

    let profile = state
        .store
        .fetch_profile(user_id)
        .await
        .map_err(ApiError::upstream("profile store"))?
        .ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!("profile row missing for user {user_id}"))
        })?;

    let mut filtered = Map::new();
    for role in &roles {
        for name in role_fields(*role) {
            filtered.insert(
                (*name).to_string(),
                profile.fields.get(*name).cloned().unwrap_or(Value::Null),
            );
        }
    }
    for name in COMMON_FIELDS {
        filtered.insert(
            (*name).to_string(),
            profile.fields.get(*name).cloned().unwrap_or(Value::Null),
        );
    }
    filtered.insert("is_onboarded".to_string(), Value::Bool(profile.is_onboarded));

    Ok(ProfileResponse {
        user: UserInfo {
            id: user.id,
            email: user.email,
            is_email_verified: user.is_email_verified,
            created_at: user.created_at,
        },
        roles,
        profile: filtered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dto::RegisterRequest;
    use crate::auth::registration::register;
    use crate::store::ProfileStore;
    use crate::test_support::fake_state;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    fn common_payload() -> Map<String, Value> {
        as_map(json!({
            "first_name": "Jean",
            "last_name": "Dupont",
            "email": "jean@x.com",
            "phone": "+41789054467",
            "address": "123 Main Street",
            "zip_code": "75001",
            "birth_date": "1990-01-01",
            "nationality": "French",
            "professional_status": "employed",
        }))
    }

    fn lister_payload() -> Map<String, Value> {
        let mut payload = common_payload();
        payload.extend(as_map(json!({
            "agency_name": "Acme",
            "agency_license": "LIC123",
            "agency_address": "789 Agency Blvd",
            "agency_phone": "+41000000000",
            "owner_status": "owner",
            "number_of_properties": 10,
            "property_relation": "owner",
        })));
        payload
    }

    async fn registered_lister(ts: &crate::test_support::TestState) -> Uuid {
        register(
            &ts.state,
            RegisterRequest {
                email: "lister@x.com".into(),
                password: "Aa1!aaaa".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                role: Some(Role::Lister),
            },
        )
        .await
        .unwrap()
        .user_id
    }

    #[test]
    fn missing_fields_are_reported_in_one_batch() {
        let payload = as_map(json!({
            "agency_name": "Acme",
            "first_name": "",        // empty string counts as missing
            "agency_phone": null,    // null counts as missing
        }));
        let missing = missing_required_fields(Role::Lister, &payload);
        // Everything required except agency_name: 9 common + 6 lister.
        assert_eq!(missing.len(), 15);
        assert!(missing.contains(&"first_name".to_string()));
        assert!(missing.contains(&"agency_phone".to_string()));
        assert!(missing.contains(&"agency_license".to_string()));
        assert!(missing.contains(&"owner_status".to_string()));
        assert!(!missing.contains(&"agency_name".to_string()));
    }

    #[test]
    fn empty_arrays_satisfy_required_array_fields() {
        let mut payload = common_payload();
        payload.extend(as_map(json!({
            "preferred_property_types": [],
            "min_price": 500,
            "max_price": 900,
            "preferred_locations": ["Geneva"],
            "id_document_url": "https://s/a.pdf",
            "employment_certificate_url": "https://s/b.pdf",
            "salary_slips_urls": [],
            "rental_attestation_url": "https://s/c.pdf",
            "debt_certificate_url": "https://s/d.pdf",
            "residence_permit_url": "https://s/e.pdf",
            "guarantor_documents_urls": [],
        })));
        assert!(missing_required_fields(Role::Candidate, &payload).is_empty());
    }

    #[tokio::test]
    async fn onboarding_validates_then_merges_and_flips_the_flag() {
        let ts = fake_state();
        let user_id = registered_lister(&ts).await;

        let err = complete_onboarding(
            &ts.state,
            user_id,
            Role::Lister,
            as_map(json!({ "agency_name": "Acme" })),
        )
        .await
        .unwrap_err();
        match err {
            ApiError::Validation { missing_fields } => {
                assert_eq!(missing_fields.len(), 15);
                for field in [
                    "agency_license",
                    "agency_address",
                    "agency_phone",
                    "owner_status",
                    "number_of_properties",
                    "property_relation",
                    "first_name",
                ] {
                    assert!(missing_fields.contains(&field.to_string()), "{field}");
                }
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        let profile = ts.store.fetch_profile(user_id).await.unwrap().unwrap();
        assert!(!profile.is_onboarded);

        complete_onboarding(&ts.state, user_id, Role::Lister, lister_payload())
            .await
            .unwrap();
        let profile = ts.store.fetch_profile(user_id).await.unwrap().unwrap();
        assert!(profile.is_onboarded);
        assert_eq!(profile.fields["agency_name"], "Acme");
        // Optional fields absent from the payload keep their default.
        assert_eq!(profile.fields["bio"], Value::Null);
    }

    #[tokio::test]
    async fn repeat_onboarding_merges_and_keeps_earlier_fields() {
        let ts = fake_state();
        let user_id = registered_lister(&ts).await;

        complete_onboarding(&ts.state, user_id, Role::Lister, lister_payload())
            .await
            .unwrap();

        let mut second = lister_payload();
        second.insert("agency_name".into(), json!("Acme Two"));
        second.remove("agency_license");
        second.insert("agency_license".into(), json!("LIC999"));
        complete_onboarding(&ts.state, user_id, Role::Lister, second)
            .await
            .unwrap();

        let profile = ts.store.fetch_profile(user_id).await.unwrap().unwrap();
        assert!(profile.is_onboarded);
        assert_eq!(profile.fields["agency_name"], "Acme Two");
        assert_eq!(profile.fields["agency_license"], "LIC999");
        // A field from the first submission, untouched by the second.
        assert_eq!(profile.fields["owner_status"], "owner");
    }

    #[tokio::test]
    async fn update_is_partial_and_never_touches_is_onboarded() {
        let ts = fake_state();
        let user_id = registered_lister(&ts).await;

        update_profile(&ts.state, user_id, as_map(json!({ "bio": "hello" })))
            .await
            .unwrap();
        let profile = ts.store.fetch_profile(user_id).await.unwrap().unwrap();
        assert_eq!(profile.fields["bio"], "hello");
        assert!(!profile.is_onboarded);

        complete_onboarding(&ts.state, user_id, Role::Lister, lister_payload())
            .await
            .unwrap();
        // Clearing a once-required field does not reset the flag.
        update_profile(&ts.state, user_id, as_map(json!({ "agency_name": null })))
            .await
            .unwrap();
        let profile = ts.store.fetch_profile(user_id).await.unwrap().unwrap();
        assert!(profile.is_onboarded);
        assert_eq!(profile.fields["agency_name"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let ts = fake_state();
        let user_id = registered_lister(&ts).await;

        let err = update_profile(&ts.state, user_id, as_map(json!({ "is_onboarded": true })))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = update_profile(&ts.state, user_id, as_map(json!({ "admin": true })))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn profile_view_is_filtered_to_held_roles() {
        let ts = fake_state();
        let user_id = registered_lister(&ts).await;

        let view = get_profile(&ts.state, user_id).await.unwrap();
        assert_eq!(view.roles, vec![Role::Lister]);
        assert!(view.profile.contains_key("agency_name"));
        assert!(view.profile.contains_key("bio"));
        assert!(!view.profile.contains_key("id_document_url"));
        assert_eq!(view.profile["is_onboarded"], Value::Bool(false));
        assert_eq!(view.user.email, "lister@x.com");
    }
}
