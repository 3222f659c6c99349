//! Shared types for the synchronization engine.

pub mod errors;
pub mod events;

pub use errors::{SyncError, SyncResult};
pub use events::{ClientEvent, ServerEvent};

pub type RoomId = String;
pub type UserId = String;
