use std::sync::Arc;
use tracing::info;

use crate::{
    config::{Config, DatabaseBackend},
    infrastructure::{
        activity_type_registry::{ActivityTypeRegistry, ActivityTypeResolver},
        database::{DatabaseInterface, PostgresDatabase},
        id_generator::UniqueIdGenerator,
        sqlite_database::SqliteDatabase,
    },
    repo::{FollowActionRepo, FollowRepo},
};

#[derive(Clone)]
pub struct AppState {
    pub database: Arc<dyn DatabaseInterface>,
    pub activity_types: Arc<ActivityTypeRegistry>,
    pub id_generator: Arc<UniqueIdGenerator>,
    pub follow_repo: FollowRepo,
    pub follow_action_repo: FollowActionRepo,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database: Arc<dyn DatabaseInterface> = match config.database.backend() {
            DatabaseBackend::Postgres => Arc::new(
                PostgresDatabase::connect(&config.database.url, config.database.max_connections).await?,
            ),
            DatabaseBackend::Sqlite => Arc::new(
                SqliteDatabase::connect(&config.database.url, config.database.max_connections).await?,
            ),
        };
        database.initialize().await?;

        let registry = match &config.activity.registry_path {
            Some(path) => ActivityTypeRegistry::from_json_file(path)?,
            None => ActivityTypeRegistry::new(),
        };
        info!("Activity type registry ready with {} entries", registry.len());

        Ok(Self::from_parts(database, Arc::new(registry), config))
    }

    /// Wire repositories over an already initialized store
    pub fn from_parts(
        database: Arc<dyn DatabaseInterface>,
        activity_types: Arc<ActivityTypeRegistry>,
        config: Config,
    ) -> Self {
        let resolver: Arc<dyn ActivityTypeResolver> = activity_types.clone();
        Self {
            follow_repo: FollowRepo::new(database.clone(), resolver.clone()),
            follow_action_repo: FollowActionRepo::new(database.clone(), resolver),
            id_generator: Arc::new(UniqueIdGenerator::default()),
            database,
            activity_types,
            config,
        }
    }
}
