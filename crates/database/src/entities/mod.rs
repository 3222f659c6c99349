//! Row-level entity definitions used by the repository layer

pub mod document;
pub mod room;

pub use document::{DocumentRecord, HistoryRecord};
pub use room::{CreateRoomRecord, RoomRecord};
