use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::dto::UserInfo;
use crate::profiles::schema::Role;

/// Onboarding submission: the role the payload is validated against plus the
/// profile fields themselves.
#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub role: Role,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub message: &'static str,
}

/// Full profile view: user header, held roles, and the field bag filtered to
/// the common block plus the blocks of the held roles.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserInfo,
    pub roles: Vec<Role>,
    pub profile: Map<String, Value>,
}
