use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Closed role set. The assigned role decides the profile shape and the
/// required onboarding fields, both resolved here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "CANDIDATE")]
    Candidate,
    #[serde(alias = "LISTER")]
    Lister,
}

pub const ALL_ROLES: [Role; 2] = [Role::Candidate, Role::Lister];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Lister => "lister",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "candidate" => Ok(Role::Candidate),
            "lister" => Ok(Role::Lister),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

/// One row per user. The role-dependent field bag lives in `fields`;
/// `is_onboarded` and `user_type` are first-class columns.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_type: Role,
    pub is_onboarded: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub fields: Map<String, Value>,
}

/// Fields every profile carries regardless of role.
pub const COMMON_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "birth_date",
    "nationality",
    "marital_status",
    "number_of_children",
    "phone",
    "email",
    "current_address",
    "zip_code",
    "address_since",
    "moving_reason",
    "professional_status",
    "employer",
    "position",
    "work_rate",
    "contract_type",
    "contract_start_date",
    "monthly_income",
    "partner_income",
    "other_income",
    "phone_number",
    "address",
    "city",
    "postal_code",
    "bio",
    "avatar_url",
    "profile_photo_url",
    "preferred_language",
    "contact_methods",
    "correspondence_address",
];

pub const CANDIDATE_FIELDS: &[&str] = &[
    "preferred_property_types",
    "min_price",
    "max_price",
    "preferred_locations",
    "id_document_url",
    "employment_certificate_url",
    "salary_slips_urls",
    "rental_attestation_url",
    "debt_certificate_url",
    "residence_permit_url",
    "guarantor_documents_urls",
];

pub const LISTER_FIELDS: &[&str] = &[
    "agency_name",
    "agency_license",
    "agency_address",
    "agency_phone",
    "owner_status",
    "number_of_properties",
    "property_relation",
];

/// Candidate fields that hold a list of values; they default to `[]` rather
/// than null, and the file classifier accumulates URLs into them.
pub const CANDIDATE_ARRAY_FIELDS: &[&str] = &[
    "preferred_property_types",
    "preferred_locations",
    "salary_slips_urls",
    "guarantor_documents_urls",
];

const REQUIRED_COMMON: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "phone",
    "address",
    "zip_code",
    "birth_date",
    "nationality",
    "professional_status",
];

pub fn role_fields(role: Role) -> &'static [&'static str] {
    match role {
        Role::Candidate => CANDIDATE_FIELDS,
        Role::Lister => LISTER_FIELDS,
    }
}

/// Required-field set for onboarding: the common set unioned with the role
/// set. Single source of truth for the onboarding validator.
pub fn required_onboarding_fields(role: Role) -> Vec<&'static str> {
    REQUIRED_COMMON
        .iter()
        .chain(role_fields(role).iter())
        .copied()
        .collect()
}

/// True when `name` is a field some role's profile can carry.
pub fn is_known_field(name: &str) -> bool {
    COMMON_FIELDS.contains(&name)
        || CANDIDATE_FIELDS.contains(&name)
        || LISTER_FIELDS.contains(&name)
}

/// Default profile for a freshly registered user: common block all null,
/// role block null except array-valued fields which start empty.
pub fn default_profile(user_id: Uuid, role: Role) -> Profile {
    let mut fields = Map::new();
    for name in COMMON_FIELDS {
        fields.insert((*name).to_string(), Value::Null);
    }
    for name in role_fields(role) {
        let value = if role == Role::Candidate && CANDIDATE_ARRAY_FIELDS.contains(name) {
            Value::Array(Vec::new())
        } else {
            Value::Null
        };
        fields.insert((*name).to_string(), value);
    }
    let now = OffsetDateTime::now_utc();
    Profile {
        id: user_id,
        user_type: role,
        is_onboarded: false,
        created_at: now,
        updated_at: now,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_profile_never_carries_lister_fields() {
        let profile = default_profile(Uuid::new_v4(), Role::Candidate);
        for name in LISTER_FIELDS {
            assert!(
                !profile.fields.contains_key(*name),
                "candidate profile holds lister field {name}"
            );
        }
    }

    #[test]
    fn lister_profile_never_carries_candidate_fields() {
        let profile = default_profile(Uuid::new_v4(), Role::Lister);
        for name in CANDIDATE_FIELDS {
            assert!(
                !profile.fields.contains_key(*name),
                "lister profile holds candidate field {name}"
            );
        }
    }

    #[test]
    fn role_block_defaults_are_null_or_empty_array() {
        for role in ALL_ROLES {
            let profile = default_profile(Uuid::new_v4(), role);
            assert!(!profile.is_onboarded);
            for (name, value) in &profile.fields {
                match value {
                    Value::Null => {}
                    Value::Array(items) => {
                        assert!(items.is_empty(), "{name} defaults non-empty");
                        assert!(CANDIDATE_ARRAY_FIELDS.contains(&name.as_str()));
                    }
                    other => panic!("{name} defaults to {other:?}"),
                }
            }
        }
    }

    #[test]
    fn candidate_required_set_includes_preferences_and_documents() {
        let required = required_onboarding_fields(Role::Candidate);
        for name in CANDIDATE_FIELDS {
            assert!(required.contains(name));
        }
        assert!(required.contains(&"professional_status"));
        assert!(!required.contains(&"bio"));
        assert!(!required.contains(&"agency_name"));
    }

    #[test]
    fn lister_required_set_is_common_plus_agency_fields() {
        let required = required_onboarding_fields(Role::Lister);
        assert_eq!(required.len(), 9 + 7);
        for name in LISTER_FIELDS {
            assert!(required.contains(name));
        }
        assert!(!required.contains(&"id_document_url"));
    }

    #[test]
    fn role_round_trips_through_serde_and_aliases() {
        let role: Role = serde_json::from_str(r#""CANDIDATE""#).unwrap();
        assert_eq!(role, Role::Candidate);
        let role: Role = serde_json::from_str(r#""lister""#).unwrap();
        assert_eq!(role, Role::Lister);
        assert_eq!(serde_json::to_string(&Role::Candidate).unwrap(), r#""candidate""#);
        assert!(serde_json::from_str::<Role>(r#""admin""#).is_err());
    }
}
