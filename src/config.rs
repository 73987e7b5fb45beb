use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub verify_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    /// Base used to build public object URLs; defaults to the endpoint.
    pub public_base_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub documents_bucket: String,
    pub avatars_bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:4000".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "rentmatch".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "rentmatch-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            verify_ttl_minutes: std::env::var("JWT_VERIFY_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };
        let endpoint = std::env::var("STORAGE_ENDPOINT")?;
        let storage = StorageConfig {
            public_base_url: std::env::var("STORAGE_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| endpoint.clone()),
            endpoint,
            access_key: std::env::var("STORAGE_ACCESS_KEY")?,
            secret_key: std::env::var("STORAGE_SECRET_KEY")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            documents_bucket: std::env::var("STORAGE_DOCUMENTS_BUCKET")
                .unwrap_or_else(|_| "documents".into()),
            avatars_bucket: std::env::var("STORAGE_AVATARS_BUCKET")
                .unwrap_or_else(|_| "avatars".into()),
        };
        Ok(Self {
            database_url,
            frontend_url,
            jwt,
            storage,
        })
    }
}
