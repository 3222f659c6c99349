//! # Roomsync Sync Crate
//!
//! Room membership and real-time document synchronization. Clients join a
//! room, receive the current document, broadcast whole-document edits and
//! converge on a single ordered version history. Presence and chat events
//! are relayed to the room without being stored.
//!
//! ## Architecture
//!
//! - **Entities**: rooms, documents, snapshots and history entries
//! - **Types**: wire events and errors
//! - **Registry**: live connections and their room membership
//! - **Channel**: per-room fan-out over bounded connection outboxes
//! - **Policy**: conflict policies (last-write-wins by default)
//! - **Store**: document store and room directory contracts, in-memory and SQLite
//! - **Engine**: the join / edit / relay / disconnect state machine
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use roomsync_config::SyncConfig;
//! use roomsync_sync::{
//!     ClientEvent, CreateRoomRequest, MemoryDocumentStore, MemoryRoomDirectory, RoomDirectory,
//!     ServerEvent, SyncEngine,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let documents = Arc::new(MemoryDocumentStore::new(0));
//! let directory = Arc::new(MemoryRoomDirectory::with_documents(documents.clone()));
//! let room = directory
//!     .create_room(CreateRoomRequest::new("pairing", "alice"))
//!     .await
//!     .unwrap();
//!
//! let engine = SyncEngine::new(documents, directory, &SyncConfig::default());
//! let (mut connection, mut outbox) = engine.open().await;
//! connection
//!     .handle(ClientEvent::JoinRoom { room_id: room.id.clone(), user_id: "alice".into() })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(
//!     outbox.recv().await,
//!     Some(ServerEvent::DocumentLoad { content: String::new(), version: 0 })
//! );
//! connection.close().await;
//! # });
//! ```

pub mod channel;
pub mod engine;
pub mod entities;
pub mod policy;
pub mod registry;
pub mod store;
pub mod types;

pub use channel::{ChannelStats, RoomChannel};
pub use engine::{Connection, ConnectionState, EditOutcome, EngineSettings, JoinOutcome, SyncEngine};
pub use entities::{CreateRoomRequest, Document, DocumentSnapshot, HistoryEntry, Room};
pub use policy::{policy_for, ConflictPolicy, EditDecision, EditProposal, LastWriteWins, VersionChecked};
pub use registry::{Admission, ConnectionId, Departure, Session, SessionRegistry};
pub use store::{
    DocumentStore, MemoryDocumentStore, MemoryRoomDirectory, RoomDirectory, SqliteDocumentStore,
    SqliteRoomDirectory,
};
pub use types::{ClientEvent, ServerEvent, SyncError, SyncResult};
