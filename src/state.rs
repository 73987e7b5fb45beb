use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::identity::{IdentityProvider, PgIdentityProvider};
use crate::storage::{S3Storage, StorageGateway};
use crate::store::{PgProfileStore, ProfileStore};

/// Process-wide collaborators, constructed once at startup and injected into
/// every component. No lazy global singletons.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ProfileStore>,
    pub storage: Arc<dyn StorageGateway>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let identity = Arc::new(PgIdentityProvider::new(db.clone())) as Arc<dyn IdentityProvider>;
        let store = Arc::new(PgProfileStore::new(db.clone())) as Arc<dyn ProfileStore>;
        let storage = Arc::new(S3Storage::new(&config.storage).await?) as Arc<dyn StorageGateway>;

        Ok(Self {
            db,
            config,
            identity,
            store,
            storage,
        })
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        storage: Arc<dyn StorageGateway>,
    ) -> Self {
        Self {
            db,
            config,
            identity,
            store,
            storage,
        }
    }
}
