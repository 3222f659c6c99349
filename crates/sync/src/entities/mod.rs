//! Domain entities for rooms and shared documents.

pub mod document;
pub mod room;

pub use document::{Document, DocumentSnapshot, HistoryEntry};
pub use room::{CreateRoomRequest, Room};
