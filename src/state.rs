use aws_config::BehaviorVersion;
use aws_config::Region;
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, BlobBackend, IdentityBackend, RecordBackend};
use crate::database::{DatabaseError, DatabaseManager, MemoryRecordStore, PgRecordStore, RecordStore};
use crate::identity::{CognitoIdentityProvider, IdentityProvider, StaticIdentityProvider};
use crate::services::{FileService, ProjectService, TeamService, UserService};
use crate::storage::{BlobStore, MemoryBlobStore, S3BlobStore};

/// Shared handles for every request: configuration plus the three backends
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            records,
            blobs,
            identity,
        }
    }

    /// Build the configured backends. AWS clients share one SDK config.
    pub async fn from_config(config: AppConfig) -> Result<Self, DatabaseError> {
        let needs_aws =
            config.storage.backend == BlobBackend::S3 || config.identity.backend == IdentityBackend::Cognito;
        let sdk_config = if needs_aws {
            Some(
                aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.storage.region.clone()))
                    .load()
                    .await,
            )
        } else {
            None
        };

        let records: Arc<dyn RecordStore> = match config.database.backend {
            RecordBackend::Postgres => {
                let db = DatabaseManager::connect(&config.database).await?;
                Arc::new(PgRecordStore::new(db))
            }
            RecordBackend::Memory => Arc::new(MemoryRecordStore::new()),
        };

        let blobs: Arc<dyn BlobStore> = match (&config.storage.backend, &sdk_config) {
            (BlobBackend::S3, Some(sdk)) => Arc::new(S3BlobStore::new(&config.storage, sdk)),
            _ => Arc::new(MemoryBlobStore::new()),
        };

        let identity: Arc<dyn IdentityProvider> = match (&config.identity.backend, &sdk_config) {
            (IdentityBackend::Cognito, Some(sdk)) => Arc::new(CognitoIdentityProvider::new(&config.identity, sdk)),
            _ => Arc::new(StaticIdentityProvider::from_entries(&config.identity.static_users)),
        };

        info!(
            "Backends: records={:?} blobs={:?} identity={:?}",
            config.database.backend, config.storage.backend, config.identity.backend
        );

        Ok(Self::new(config, records, blobs, identity))
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self.records.clone())
    }

    pub fn files(&self) -> FileService {
        FileService::new(self.records.clone(), self.blobs.clone())
    }

    pub fn team(&self) -> TeamService {
        TeamService::new(self.records.clone(), self.identity.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.records.clone(), self.identity.clone())
    }
}
