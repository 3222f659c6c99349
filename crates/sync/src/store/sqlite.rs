//! Store implementations backed by the SQLite repositories.

use async_trait::async_trait;
use roomsync_database::{
    CreateRoomRecord, DocumentRecord, DocumentRepository, HistoryRecord, RoomRecord,
    RoomRepository,
};
use sqlx::SqlitePool;

use super::{DocumentStore, RoomDirectory};
use crate::entities::{CreateRoomRequest, DocumentSnapshot, HistoryEntry, Room};
use crate::types::{SyncError, SyncResult};

fn to_version(version: i64) -> SyncResult<u64> {
    u64::try_from(version).map_err(|_| SyncError::Internal {
        message: format!("negative document version {version}"),
    })
}

impl From<RoomRecord> for Room {
    fn from(record: RoomRecord) -> Self {
        Room {
            id: record.id,
            name: record.name,
            description: record.description,
            language: record.language,
            is_public: record.is_public,
            owner_id: record.owner_id,
            members: record.members,
            created_at: record.created_at,
        }
    }
}

impl From<CreateRoomRequest> for CreateRoomRecord {
    fn from(request: CreateRoomRequest) -> Self {
        CreateRoomRecord {
            name: request.name,
            description: request.description,
            language: request.language,
            is_public: request.is_public,
            owner_id: request.owner_id,
        }
    }
}

impl TryFrom<DocumentRecord> for DocumentSnapshot {
    type Error = SyncError;

    fn try_from(record: DocumentRecord) -> SyncResult<Self> {
        Ok(DocumentSnapshot {
            content: record.content,
            version: to_version(record.version)?,
            last_editor: record.last_editor,
        })
    }
}

impl TryFrom<HistoryRecord> for HistoryEntry {
    type Error = SyncError;

    fn try_from(record: HistoryRecord) -> SyncResult<Self> {
        Ok(HistoryEntry {
            version: to_version(record.version)?,
            content: record.content,
            editor: record.editor,
            timestamp: record.edited_at,
        })
    }
}

/// Document store over the `documents` and `document_history` tables
#[derive(Clone)]
pub struct SqliteDocumentStore {
    repository: DocumentRepository,
    history_limit: u64,
}

impl SqliteDocumentStore {
    /// `history_limit` of 0 keeps every history entry
    pub fn new(pool: SqlitePool, history_limit: u64) -> Self {
        Self {
            repository: DocumentRepository::new(pool),
            history_limit,
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn load(&self, room_id: &str) -> SyncResult<DocumentSnapshot> {
        self.repository.load(room_id).await?.try_into()
    }

    async fn append_edit(&self, room_id: &str, content: &str, editor: &str) -> SyncResult<u64> {
        let version = self
            .repository
            .append_edit(room_id, content, editor, self.history_limit)
            .await?;
        to_version(version)
    }

    async fn history(&self, room_id: &str) -> SyncResult<Vec<HistoryEntry>> {
        self.repository
            .history(room_id)
            .await?
            .into_iter()
            .map(HistoryEntry::try_from)
            .collect()
    }
}

/// Room directory over the `rooms` and `room_members` tables
#[derive(Clone)]
pub struct SqliteRoomDirectory {
    repository: RoomRepository,
}

impl SqliteRoomDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repository: RoomRepository::new(pool),
        }
    }
}

#[async_trait]
impl RoomDirectory for SqliteRoomDirectory {
    async fn find_room(&self, room_id: &str) -> SyncResult<Option<Room>> {
        Ok(self.repository.find_by_id(room_id).await?.map(Room::from))
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> SyncResult<bool> {
        Ok(self.repository.add_member(room_id, user_id).await?)
    }

    async fn create_room(&self, request: CreateRoomRequest) -> SyncResult<Room> {
        let record = self.repository.create(&request.into()).await?;
        Ok(record.into())
    }

    async fn list_rooms_for(&self, user_id: &str) -> SyncResult<Vec<Room>> {
        Ok(self
            .repository
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(Room::from)
            .collect())
    }
}
