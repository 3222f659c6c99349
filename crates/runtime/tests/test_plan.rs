use std::path::Path;

use anyhow::{Context, Result};
use roomsync_config::{AppConfig, ConflictPolicyKind, SeedRoom, StoreBackend};
use roomsync_runtime::BackendServices;
use roomsync_sync::{CreateRoomRequest, DocumentStore, JoinOutcome, RoomDirectory, ServerEvent};
use tempfile::TempDir;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(store: StoreBackend, database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.sync.store = store;
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations_for_sqlite_store() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(StoreBackend::Sqlite, sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let pool = services.db_pool.clone().context("sqlite store keeps a pool")?;
    let table: String = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'documents'",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!("documents", table);
    assert!(db_path.exists(), "sqlite database file should be created");

    services.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_applies_max_connections_setting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/max_conn.db");
    let config = build_config(StoreBackend::Sqlite, sqlite_url(&db_path), 3);

    let services = initialise(&config).await?;
    let pool = services.db_pool.clone().context("sqlite store keeps a pool")?;
    assert_eq!(3, pool.options().get_max_connections());

    services.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_store_needs_no_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("never/created.db");
    let config = build_config(StoreBackend::Memory, sqlite_url(&db_path), 1);

    let services = initialise(&config).await?;
    assert!(services.db_pool.is_none());
    assert!(!db_path.exists(), "memory store must not touch the database");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn services_share_stores_with_the_engine() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/shared.db");
    let config = build_config(StoreBackend::Sqlite, sqlite_url(&db_path), 2);
    let services = initialise(&config).await?;

    let room = services
        .directory
        .create_room(CreateRoomRequest::new("pairing", "ada").public(true))
        .await?;

    let (mut connection, mut rx) = services.engine.open().await;
    let outcome = connection.join(&room.id, "grace").await?;
    assert_eq!(outcome, JoinOutcome::Joined { version: 0 });
    assert_eq!(
        rx.recv().await,
        Some(ServerEvent::DocumentLoad {
            content: String::new(),
            version: 0
        })
    );

    connection.edit("fn main() {}".into(), None, None).await?;
    let snapshot = services.documents.load(&room.id).await?;
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.content, "fn main() {}");

    connection.close().await;
    services.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_conflict_policy_reaches_the_engine() -> Result<()> {
    let mut config = build_config(StoreBackend::Memory, "sqlite::memory:".into(), 1);
    config.sync.conflict_policy = ConflictPolicyKind::VersionChecked;

    let services = initialise(&config).await?;
    assert_eq!(services.engine.policy().name(), "version-checked");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_store_serves_seeded_rooms() -> Result<()> {
    let mut config = build_config(StoreBackend::Memory, "sqlite::memory:".into(), 1);
    config.sync.rooms = vec![
        SeedRoom {
            id: "lobby".into(),
            name: None,
            owner: "ada".into(),
            public: true,
            language: None,
            members: Vec::new(),
        },
        SeedRoom {
            id: "private".into(),
            name: Some("Private".into()),
            owner: "ada".into(),
            public: false,
            language: Some("rust".into()),
            members: vec!["grace".into()],
        },
    ];
    let services = initialise(&config).await?;

    let (mut guest, mut rx) = services.engine.open().await;
    let outcome = guest.join("lobby", "linus").await?;
    assert_eq!(outcome, JoinOutcome::Joined { version: 0 });
    assert_eq!(
        rx.recv().await,
        Some(ServerEvent::DocumentLoad {
            content: String::new(),
            version: 0
        })
    );

    let (mut member, _member_rx) = services.engine.open().await;
    assert_eq!(
        member.join("private", "grace").await?,
        JoinOutcome::Joined { version: 0 }
    );

    let (mut stranger, _stranger_rx) = services.engine.open().await;
    assert!(matches!(
        stranger.join("private", "linus").await?,
        JoinOutcome::Denied { .. }
    ));

    guest.close().await;
    member.close().await;
    stranger.close().await;
    Ok(())
}
