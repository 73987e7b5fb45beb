use std::str::FromStr;

use axum::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::profiles::schema::{Profile, Role};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-key violation, surfaced distinctly so the registration
    /// orchestrator can report `Conflict` instead of a provisioning failure.
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Io(e.into()),
        }
    }
}

/// Mirror of an identity in the relational store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_email_verified: bool,
    pub created_at: OffsetDateTime,
}

/// Row-level access to `users`, `user_roles` and `profiles`. No multi-row
/// transaction primitive: callers that need atomicity across these tables
/// must compensate (see registration).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError>;
    async fn insert_user(
        &self,
        id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), StoreError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;
    async fn set_email_verified(&self, id: Uuid) -> Result<(), StoreError>;

    async fn insert_role(&self, user_id: Uuid, role: Role) -> Result<(), StoreError>;
    async fn delete_roles(&self, user_id: Uuid) -> Result<(), StoreError>;
    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError>;

    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError>;
    async fn delete_profile(&self, user_id: Uuid) -> Result<(), StoreError>;
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;
    /// Merge `fields` over the stored bag; absent fields keep their value.
    /// `set_onboarded` can only flip the flag on, never off.
    async fn merge_profile(
        &self,
        user_id: Uuid,
        fields: &Map<String, Value>,
        set_onboarded: bool,
    ) -> Result<(), StoreError>;
}

pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

type ProfileTuple = (
    Uuid,
    String,
    bool,
    OffsetDateTime,
    OffsetDateTime,
    Json<Map<String, Value>>,
);

fn profile_from_row(row: ProfileTuple) -> Result<Profile, StoreError> {
    let (id, user_type, is_onboarded, created_at, updated_at, Json(fields)) = row;
    Ok(Profile {
        id,
        user_type: Role::from_str(&user_type).map_err(StoreError::Io)?,
        is_onboarded,
        created_at,
        updated_at,
        fields,
    })
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, first_name, last_name, is_email_verified, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, first_name, last_name, is_email_verified, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert_user(
        &self,
        id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, is_email_verified)
            VALUES ($1, $2, $3, $4, FALSE)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE users SET is_email_verified = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_role(&self, user_id: Uuid, role: Role) -> Result<(), StoreError> {
        sqlx::query(r#"INSERT INTO user_roles (user_id, role) VALUES ($1, $2)"#)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_roles(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM user_roles WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"SELECT role FROM user_roles WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter()
            .map(|(r,)| Role::from_str(&r).map_err(StoreError::Io))
            .collect()
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, user_type, is_onboarded, created_at, updated_at, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(profile.id)
        .bind(profile.user_type.as_str())
        .bind(profile.is_onboarded)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .bind(Json(&profile.fields))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_profile(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM profiles WHERE id = $1"#)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileTuple>(
            r#"
            SELECT id, user_type, is_onboarded, created_at, updated_at, data
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(profile_from_row).transpose()
    }

    async fn merge_profile(
        &self,
        user_id: Uuid,
        fields: &Map<String, Value>,
        set_onboarded: bool,
    ) -> Result<(), StoreError> {
        let done = sqlx::query(
            r#"
            UPDATE profiles
            SET data = data || $2,
                is_onboarded = is_onboarded OR $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(Json(fields))
        .bind(set_onboarded)
        .execute(&self.db)
        .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::Io(anyhow::anyhow!(
                "profile row missing for user {user_id}"
            )));
        }
        Ok(())
    }
}
