//! Conflict policies deciding whether an incoming edit is applied.

use std::fmt;
use std::sync::Arc;

use roomsync_config::ConflictPolicyKind;

use crate::entities::DocumentSnapshot;

/// An edit as seen by a conflict policy
#[derive(Debug, Clone, Copy)]
pub struct EditProposal<'a> {
    pub user_id: &'a str,
    pub content: &'a str,
    /// Version the client based its edit on, if it told us
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditDecision {
    Accept,
    Reject { reason: String },
}

/// Decides whether an edit may be appended to the current document.
pub trait ConflictPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn evaluate(&self, current: &DocumentSnapshot, proposal: &EditProposal<'_>) -> EditDecision;
}

/// Every edit replaces the document; the last one appended wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriteWins;

impl ConflictPolicy for LastWriteWins {
    fn name(&self) -> &'static str {
        "last-write-wins"
    }

    fn evaluate(&self, _current: &DocumentSnapshot, _proposal: &EditProposal<'_>) -> EditDecision {
        EditDecision::Accept
    }
}

/// Rejects edits based on a version older than the current one.
/// Edits that carry no base version are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionChecked;

impl ConflictPolicy for VersionChecked {
    fn name(&self) -> &'static str {
        "version-checked"
    }

    fn evaluate(&self, current: &DocumentSnapshot, proposal: &EditProposal<'_>) -> EditDecision {
        match proposal.base_version {
            Some(base) if base != current.version => EditDecision::Reject {
                reason: format!(
                    "edit based on version {base} but document is at version {}",
                    current.version
                ),
            },
            _ => EditDecision::Accept,
        }
    }
}

pub fn policy_for(kind: ConflictPolicyKind) -> Arc<dyn ConflictPolicy> {
    match kind {
        ConflictPolicyKind::LastWriteWins => Arc::new(LastWriteWins),
        ConflictPolicyKind::VersionChecked => Arc::new(VersionChecked),
    }
}
