use std::sync::Arc;

use roomsync_config::{StoreBackend, SyncConfig};
use roomsync_gateway::{create_router, GatewayState};
use roomsync_sync::{MemoryDocumentStore, MemoryRoomDirectory, Room, SyncEngine};

pub fn room(id: &str, is_public: bool) -> Room {
    Room {
        id: id.to_string(),
        name: format!("room {id}"),
        description: None,
        language: "rust".into(),
        is_public,
        owner_id: "owner".into(),
        members: vec!["owner".into()],
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Engine over memory stores with a public room `r1` and a private room `secret`
pub async fn engine() -> SyncEngine {
    let config = SyncConfig {
        store: StoreBackend::Memory,
        ..SyncConfig::default()
    };
    let documents = Arc::new(MemoryDocumentStore::new(config.history_limit));
    let directory = Arc::new(MemoryRoomDirectory::with_documents(documents.clone()));
    directory.insert(room("r1", true)).await;
    directory.insert(room("secret", false)).await;
    SyncEngine::new(documents, directory, &config)
}

pub async fn app() -> (axum::Router, SyncEngine) {
    let engine = engine().await;
    (create_router(GatewayState::new(engine.clone())), engine)
}
