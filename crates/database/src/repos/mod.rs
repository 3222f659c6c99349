//! Database repository implementations

pub mod document_repository;
pub mod room_repository;

pub use document_repository::DocumentRepository;
pub use room_repository::RoomRepository;
