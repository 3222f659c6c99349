//! Room entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub is_public: bool,
    pub owner_id: String,
    /// Member user ids ordered by join time, owner included.
    pub members: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRecord {
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub is_public: bool,
    pub owner_id: String,
}
