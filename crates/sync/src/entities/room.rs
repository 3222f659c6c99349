//! Room entity and creation request.

use roomsync_config::SeedRoom;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "javascript";

/// A named collaboration space holding one shared document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub is_public: bool,
    pub owner_id: String,
    /// Distinct member user ids, owner first.
    pub members: Vec<String>,
    pub created_at: String,
}

impl Room {
    /// Whether `user_id` belongs to the room. The owner always does.
    pub fn is_member(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.members.iter().any(|member| member == user_id)
    }

    /// Join authorization: public rooms admit anyone, private rooms only members.
    pub fn can_join(&self, user_id: &str) -> bool {
        self.is_public || self.is_member(user_id)
    }

    /// Record a member, ignoring duplicates. Returns `true` when added.
    pub fn add_member(&mut self, user_id: &str) -> bool {
        if self.members.iter().any(|member| member == user_id) {
            return false;
        }
        self.members.push(user_id.to_string());
        true
    }
}

impl From<&SeedRoom> for Room {
    fn from(seed: &SeedRoom) -> Self {
        let mut room = Room {
            id: seed.id.clone(),
            name: seed.name.clone().unwrap_or_else(|| seed.id.clone()),
            description: None,
            language: seed
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            is_public: seed.public,
            owner_id: seed.owner.clone(),
            members: vec![seed.owner.clone()],
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        for member in &seed.members {
            room.add_member(member);
        }
        room
    }
}

/// Request to create a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub is_public: bool,
    pub owner_id: String,
}

impl CreateRoomRequest {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            language: DEFAULT_LANGUAGE.to_string(),
            is_public: false,
            owner_id: owner_id.into(),
        }
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}
