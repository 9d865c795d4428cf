//! Application context - dependency injection container

use std::sync::Arc;

use tokio::task;
use tracing::info;
use userhub_core::identity::ports::IdentityVerifier;
use userhub_core::upload::ports::ObjectStore;
use userhub_core::user::ports::UserProfileRepository;
use userhub_core::{AvatarUploadService, ImageUploadValidator, ProfileSyncService};
use userhub_domain::{AccountError, Config, Result};
use userhub_infra::{DbManager, LocalObjectStore, SqliteUserProfileRepository, SupabaseAuthClient};

/// Type alias for identity verifier port trait object
type DynIdentityVerifier = dyn IdentityVerifier + Send + Sync + 'static;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub profiles: Arc<ProfileSyncService>,
    pub uploads: Arc<AvatarUploadService>,
    pub identity: Arc<DynIdentityVerifier>,
}

impl AppContext {
    /// Open the database, apply the schema and wire the production adapters.
    pub async fn new(config: Config) -> Result<Self> {
        let db_config = config.database.clone();
        let db = task::spawn_blocking(move || -> Result<DbManager> {
            let db = DbManager::from_config(&db_config)?;
            db.run_migrations()?;
            Ok(db)
        })
        .await
        .map_err(|err| AccountError::Internal(format!("database init task failed: {err}")))??;

        let store = LocalObjectStore::from_config(&config.uploads);
        store.ensure_root().await?;
        info!(upload_dir = %store.root().display(), "avatar storage ready");

        let identity = SupabaseAuthClient::new(&config.identity)?;

        Ok(Self::from_parts(config, Arc::new(db), Arc::new(store), Arc::new(identity)))
    }

    /// Assemble the context from already-built adapters.
    pub fn from_parts(
        config: Config,
        db: Arc<DbManager>,
        store: Arc<dyn ObjectStore>,
        identity: Arc<DynIdentityVerifier>,
    ) -> Self {
        let repository: Arc<dyn UserProfileRepository> =
            Arc::new(SqliteUserProfileRepository::new(Arc::clone(&db)));

        let profiles = Arc::new(ProfileSyncService::new(Arc::clone(&repository)));
        let uploads = Arc::new(
            AvatarUploadService::new(repository, store)
                .with_validator(ImageUploadValidator::default())
                .with_write_timeout(config.uploads.write_timeout()),
        );

        Self { config, db, profiles, uploads, identity }
    }
}
