use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::async_trait;
use rand::rngs::OsRng;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

/// Record owned by the identity provider; everything beyond id/email stays
/// behind the trait.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity already exists")]
    Conflict,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity not found")]
    NotFound,
    #[error("identity provider failure: {0}")]
    Upstream(#[from] anyhow::Error),
}

/// Capability interface of the external identity provider. `delete_identity`
/// exists only so registration rollback can compensate a `sign_up`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<IdentityRecord, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityRecord, IdentityError>;

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), IdentityError>;

    async fn delete_identity(&self, id: Uuid) -> Result<(), IdentityError>;
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Postgres-backed provider: one `identities` table holding the credential
/// hash and the email-verified flag. The unique key on email is the backstop
/// for concurrent same-email registrations.
pub struct PgIdentityProvider {
    db: PgPool,
}

impl PgIdentityProvider {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _first_name: &str,
        _last_name: &str,
    ) -> Result<IdentityRecord, IdentityError> {
        let hash = hash_password(password)?;
        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            INSERT INTO identities (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(&hash)
        .fetch_one(&self.db)
        .await;

        match row {
            Ok((id, email)) => {
                debug!(identity_id = %id, "identity created");
                Ok(IdentityRecord { id, email })
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(IdentityError::Conflict)
            }
            Err(e) => Err(IdentityError::Upstream(e.into())),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityRecord, IdentityError> {
        let row = sqlx::query_as::<_, (Uuid, String, String)>(
            r#"
            SELECT id, email, password_hash
            FROM identities
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| IdentityError::Upstream(e.into()))?;

        let Some((id, email, password_hash)) = row else {
            return Err(IdentityError::InvalidCredentials);
        };
        if !verify_password(password, &password_hash)? {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(IdentityRecord { id, email })
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), IdentityError> {
        let done = sqlx::query(
            r#"
            UPDATE identities SET email_verified = TRUE WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| IdentityError::Upstream(e.into()))?;

        if done.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> Result<(), IdentityError> {
        sqlx::query(r#"DELETE FROM identities WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| IdentityError::Upstream(e.into()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
