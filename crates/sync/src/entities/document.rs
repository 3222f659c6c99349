//! Shared document state and its version history.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Point-in-time view of a document as handed to joining clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub content: String,
    pub version: u64,
    pub last_editor: Option<String>,
}

impl DocumentSnapshot {
    pub fn empty() -> Self {
        Self {
            content: String::new(),
            version: 0,
            last_editor: None,
        }
    }
}

/// One accepted edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub version: u64,
    pub content: String,
    pub editor: String,
    pub timestamp: String,
}

/// A room's document with its retained history.
///
/// `version` counts accepted edits. The retained history is always a
/// contiguous run of versions ending at `version`; with a limit of 0 it
/// starts at 1.
#[derive(Debug, Clone, Default)]
pub struct Document {
    content: String,
    version: u64,
    last_editor: Option<String>,
    history: VecDeque<HistoryEntry>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content and record the edit. Returns the new version.
    pub fn append(&mut self, content: &str, editor: &str, history_limit: u64) -> u64 {
        self.version += 1;
        self.content = content.to_string();
        self.last_editor = Some(editor.to_string());
        self.history.push_back(HistoryEntry {
            version: self.version,
            content: content.to_string(),
            editor: editor.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });

        if history_limit > 0 {
            while self.history.len() as u64 > history_limit {
                self.history.pop_front();
            }
        }

        self.version
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            content: self.content.clone(),
            version: self.version,
            last_editor: self.last_editor.clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.iter().cloned().collect()
    }
}
