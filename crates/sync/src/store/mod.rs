//! Persistence contracts consumed by the engine, with in-memory and SQLite
//! implementations.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::entities::{CreateRoomRequest, DocumentSnapshot, HistoryEntry, Room};
use crate::types::SyncResult;

pub use memory::{MemoryDocumentStore, MemoryRoomDirectory};
pub use sqlite::{SqliteDocumentStore, SqliteRoomDirectory};

/// Durable per-room document record.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current document. A room that was never written reads as empty at version 0.
    async fn load(&self, room_id: &str) -> SyncResult<DocumentSnapshot>;

    /// Replace the content, bump the version by one and record history.
    /// Atomic per room. Returns the new version.
    async fn append_edit(&self, room_id: &str, content: &str, editor: &str) -> SyncResult<u64>;

    /// Retained history in ascending version order
    async fn history(&self, room_id: &str) -> SyncResult<Vec<HistoryEntry>>;
}

/// Room metadata and membership needed to authorize joins.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn find_room(&self, room_id: &str) -> SyncResult<Option<Room>>;

    /// Record membership. Returns `false` when the user already was a member.
    async fn add_member(&self, room_id: &str, user_id: &str) -> SyncResult<bool>;

    /// Create a room owned by the requester with an empty version-0 document
    async fn create_room(&self, request: CreateRoomRequest) -> SyncResult<Room>;

    /// Rooms the user owns, has joined, or that are public; newest first
    async fn list_rooms_for(&self, user_id: &str) -> SyncResult<Vec<Room>>;
}
