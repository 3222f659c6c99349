//! Wire events exchanged with clients.
//!
//! Every frame is a JSON object `{"event": <name>, "data": {...}}` with
//! camelCase payload fields. Keepalive events carry no `data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events received from clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Enter a room and request its document
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String, user_id: String },

    /// Replace the whole document content
    #[serde(rename_all = "camelCase")]
    TextChange {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_version: Option<u64>,
    },

    /// Caret position, opaque to the server
    #[serde(rename_all = "camelCase")]
    CursorPosition {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        position: Value,
    },

    #[serde(rename_all = "camelCase")]
    ChatMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },

    #[serde(rename_all = "camelCase")]
    ChatTyping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        is_typing: bool,
    },

    Ping,
}

impl ClientEvent {
    /// Wire name of the event, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "join-room",
            ClientEvent::TextChange { .. } => "text-change",
            ClientEvent::CursorPosition { .. } => "cursor-position",
            ClientEvent::ChatMessage { .. } => "chat-message",
            ClientEvent::ChatTyping { .. } => "chat-typing",
            ClientEvent::Ping => "ping",
        }
    }
}

/// Events sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full document snapshot for a joining client
    #[serde(rename_all = "camelCase")]
    DocumentLoad { content: String, version: u64 },

    #[serde(rename_all = "camelCase")]
    UserJoined { user_id: String },

    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },

    #[serde(rename_all = "camelCase")]
    JoinDenied { room_id: String, reason: String },

    /// An accepted edit, tagged with its version
    #[serde(rename_all = "camelCase")]
    TextChange {
        content: String,
        user_id: String,
        version: u64,
    },

    #[serde(rename_all = "camelCase")]
    CursorPosition { user_id: String, position: Value },

    #[serde(rename_all = "camelCase")]
    ChatMessage {
        room_id: String,
        user_id: String,
        text: String,
        ts: i64,
    },

    #[serde(rename_all = "camelCase")]
    ChatTyping {
        room_id: String,
        user_id: String,
        is_typing: bool,
    },

    Pong,

    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Wire name of the event, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::DocumentLoad { .. } => "document-load",
            ServerEvent::UserJoined { .. } => "user-joined",
            ServerEvent::UserLeft { .. } => "user-left",
            ServerEvent::JoinDenied { .. } => "join-denied",
            ServerEvent::TextChange { .. } => "text-change",
            ServerEvent::CursorPosition { .. } => "cursor-position",
            ServerEvent::ChatMessage { .. } => "chat-message",
            ServerEvent::ChatTyping { .. } => "chat-typing",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}
