use std::sync::Arc;

use anyhow::{Context, Result};
use roomsync_config::{AppConfig, StoreBackend};
use roomsync_database::initialize_database;
use roomsync_sync::{
    DocumentStore, MemoryDocumentStore, MemoryRoomDirectory, Room, RoomDirectory,
    SqliteDocumentStore, SqliteRoomDirectory, SyncEngine,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Stores and the engine wired together from configuration
#[derive(Clone)]
pub struct BackendServices {
    /// Present only for the sqlite store backend
    pub db_pool: Option<SqlitePool>,
    pub documents: Arc<dyn DocumentStore>,
    pub directory: Arc<dyn RoomDirectory>,
    pub engine: SyncEngine,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let history_limit = config.sync.history_limit;

        let (db_pool, documents, directory): (
            Option<SqlitePool>,
            Arc<dyn DocumentStore>,
            Arc<dyn RoomDirectory>,
        ) = match config.sync.store {
            StoreBackend::Sqlite => {
                let pool = initialize_database(&config.database)
                    .await
                    .context("failed to initialise sqlite store")?;
                (
                    Some(pool.clone()),
                    Arc::new(SqliteDocumentStore::new(pool.clone(), history_limit)),
                    Arc::new(SqliteRoomDirectory::new(pool)),
                )
            }
            StoreBackend::Memory => {
                let documents = Arc::new(MemoryDocumentStore::new(history_limit));
                let directory = Arc::new(MemoryRoomDirectory::with_documents(documents.clone()));
                for seed in &config.sync.rooms {
                    directory.insert(Room::from(seed)).await;
                    info!(room_id = %seed.id, owner_id = %seed.owner, public = seed.public, "room seeded");
                }
                if config.sync.rooms.is_empty() {
                    warn!("memory store has no rooms; declare them under [[sync.rooms]] or every join is denied");
                }
                (None, documents, directory)
            }
        };

        if config.sync.store == StoreBackend::Sqlite && !config.sync.rooms.is_empty() {
            warn!(
                rooms = config.sync.rooms.len(),
                "sync.rooms only seeds the memory store; use `create-room` for sqlite"
            );
        }

        let engine = SyncEngine::new(documents.clone(), directory.clone(), &config.sync);

        info!(
            store = ?config.sync.store,
            policy = engine.policy().name(),
            history_limit,
            "sync engine ready"
        );

        Ok(Self {
            db_pool,
            documents,
            directory,
            engine,
        })
    }

    /// Close the database pool, if any
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.db_pool {
            pool.close().await;
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
