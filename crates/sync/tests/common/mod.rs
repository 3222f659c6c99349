#![allow(dead_code)]

use std::sync::Arc;

use roomsync_config::{DatabaseConfig, SyncConfig};
use roomsync_sync::{
    CreateRoomRequest, DocumentStore, MemoryDocumentStore, MemoryRoomDirectory, Room,
    RoomDirectory, ServerEvent, SqliteDocumentStore, SqliteRoomDirectory, SyncEngine,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub struct Harness {
    pub engine: SyncEngine,
    pub documents: Arc<dyn DocumentStore>,
    pub directory: Arc<dyn RoomDirectory>,
    _temp_dir: Option<TempDir>,
}

impl Harness {
    pub async fn room(&self, owner: &str, is_public: bool) -> Room {
        self.directory
            .create_room(CreateRoomRequest::new("test room", owner).public(is_public))
            .await
            .unwrap()
    }
}

pub fn memory(config: SyncConfig) -> Harness {
    let documents = Arc::new(MemoryDocumentStore::new(config.history_limit));
    let directory = Arc::new(MemoryRoomDirectory::with_documents(documents.clone()));
    Harness {
        engine: SyncEngine::new(documents.clone(), directory.clone(), &config),
        documents,
        directory,
        _temp_dir: None,
    }
}

pub async fn sqlite(config: SyncConfig) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("sync.db");
    let pool = roomsync_database::initialize_database(&DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 4,
    })
    .await
    .unwrap();

    let documents = Arc::new(SqliteDocumentStore::new(pool.clone(), config.history_limit));
    let directory = Arc::new(SqliteRoomDirectory::new(pool));
    Harness {
        engine: SyncEngine::new(documents.clone(), directory.clone(), &config),
        documents,
        directory,
        _temp_dir: Some(temp_dir),
    }
}

/// Everything currently queued for a connection
pub fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn text_changes(events: &[ServerEvent]) -> Vec<(String, String, u64)> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::TextChange {
                content,
                user_id,
                version,
            } => Some((content.clone(), user_id.clone(), *version)),
            _ => None,
        })
        .collect()
}
