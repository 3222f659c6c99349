//! Process-local stores for tests and the `memory` backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{DocumentStore, RoomDirectory};
use crate::entities::{CreateRoomRequest, Document, DocumentSnapshot, HistoryEntry, Room};
use crate::types::{SyncError, SyncResult};

/// Documents kept in a map guarded by one lock
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
    history_limit: u64,
}

impl MemoryDocumentStore {
    /// `history_limit` of 0 keeps every history entry
    pub fn new(history_limit: u64) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            history_limit,
        }
    }

    /// Create an empty document if the room has none yet
    pub async fn create_empty(&self, room_id: &str) {
        let mut documents = self.documents.write().await;
        documents.entry(room_id.to_string()).or_default();
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load(&self, room_id: &str) -> SyncResult<DocumentSnapshot> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(room_id)
            .map(Document::snapshot)
            .unwrap_or_else(DocumentSnapshot::empty))
    }

    async fn append_edit(&self, room_id: &str, content: &str, editor: &str) -> SyncResult<u64> {
        let mut documents = self.documents.write().await;
        let document = documents.entry(room_id.to_string()).or_default();
        let version = document.append(content, editor, self.history_limit);
        debug!(room_id, version, editor, "document edit appended");
        Ok(version)
    }

    async fn history(&self, room_id: &str) -> SyncResult<Vec<HistoryEntry>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(room_id)
            .map(Document::history)
            .unwrap_or_default())
    }
}

/// Rooms kept in a map, optionally creating documents in a shared memory store
#[derive(Default)]
pub struct MemoryRoomDirectory {
    rooms: RwLock<HashMap<String, Room>>,
    documents: Option<Arc<MemoryDocumentStore>>,
}

impl MemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Arc<MemoryDocumentStore>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            documents: Some(documents),
        }
    }

    /// Insert a fully specified room, replacing any room with the same id
    pub async fn insert(&self, room: Room) {
        if let Some(documents) = &self.documents {
            documents.create_empty(&room.id).await;
        }
        self.rooms.write().await.insert(room.id.clone(), room);
    }
}

#[async_trait]
impl RoomDirectory for MemoryRoomDirectory {
    async fn find_room(&self, room_id: &str) -> SyncResult<Option<Room>> {
        Ok(self.rooms.read().await.get(room_id).cloned())
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> SyncResult<bool> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_id).ok_or_else(|| SyncError::RoomNotFound {
            room_id: room_id.to_string(),
        })?;
        Ok(room.add_member(user_id))
    }

    async fn create_room(&self, request: CreateRoomRequest) -> SyncResult<Room> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(SyncError::validation("room name must not be empty"));
        }
        if request.owner_id.trim().is_empty() {
            return Err(SyncError::validation("room owner must not be empty"));
        }

        let room = Room {
            id: cuid2::create_id(),
            name: name.to_string(),
            description: request.description,
            language: request.language,
            is_public: request.is_public,
            owner_id: request.owner_id.clone(),
            members: vec![request.owner_id],
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        self.insert(room.clone()).await;
        info!(room_id = %room.id, owner_id = %room.owner_id, "room created");
        Ok(room)
    }

    async fn list_rooms_for(&self, user_id: &str) -> SyncResult<Vec<Room>> {
        let rooms = self.rooms.read().await;
        let mut visible: Vec<Room> = rooms
            .values()
            .filter(|room| room.can_join(user_id))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visible)
    }
}
