//! Document entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub room_id: String,
    pub content: String,
    pub version: i64,
    pub last_editor: Option<String>,
    pub updated_at: Option<String>,
}

impl DocumentRecord {
    /// The state of a document that has never been written.
    pub fn empty(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            content: String::new(),
            version: 0,
            last_editor: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub version: i64,
    pub content: String,
    pub editor: String,
    pub edited_at: String,
}
