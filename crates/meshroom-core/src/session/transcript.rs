//! Message relay and the local transcript
//!
//! The transcript is append-only and ordered by local arrival. Entry timestamps come
//! from whoever wrote the entry and are display data only.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::{EntryKind, MessagePayload};
use crate::types::{PeerId, Timestamp};

/// Display name attached to locally synthesized notices
pub const SYSTEM_SENDER_NAME: &str = "System";

// ----------------------------------------------------------------------------
// Chat Entry
// ----------------------------------------------------------------------------

/// Author of a transcript entry
///
/// Serialized tagged, so a peer whose transport id happens to be `"system"` stays a
/// peer: `"system"` or `{"peer": "<id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderId {
    /// Notice synthesized by this coordinator
    System,
    Peer(PeerId),
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderId::System => f.write_str("system"),
            SenderId::Peer(peer) => write!(f, "{}", peer),
        }
    }
}

/// One line of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub id: String,
    pub sender_id: SenderId,
    pub sender_name: String,
    pub kind: EntryKind,
    pub content: String,
    pub timestamp: Timestamp,
}

impl ChatEntry {
    /// Locally synthesized notice; never transmitted
    pub fn system(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: format!("sys-{}", uuid::Uuid::new_v4()),
            sender_id: SenderId::System,
            sender_name: SYSTEM_SENDER_NAME.to_string(),
            kind: EntryKind::System,
            content: content.into(),
            timestamp,
        }
    }

    /// Entry for a received payload, taken verbatim apart from the transport-reported sender
    pub fn received(payload: MessagePayload, from: PeerId) -> Self {
        Self {
            id: payload.id,
            sender_id: SenderId::Peer(from),
            sender_name: payload.sender_name,
            kind: payload.kind,
            content: payload.content,
            timestamp: payload.timestamp,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == EntryKind::System
    }
}

/// Build the local echo and the wire payload for an outgoing text message
pub fn compose_text(
    self_id: &PeerId,
    sender_name: &str,
    content: String,
    timestamp: Timestamp,
) -> (ChatEntry, MessagePayload) {
    let payload = MessagePayload {
        id: format!("msg-{}", uuid::Uuid::new_v4()),
        kind: EntryKind::Text,
        content,
        sender_name: sender_name.to_string(),
        timestamp,
    };
    let entry = ChatEntry {
        id: payload.id.clone(),
        sender_id: SenderId::Peer(self_id.clone()),
        sender_name: payload.sender_name.clone(),
        kind: payload.kind,
        content: payload.content.clone(),
        timestamp,
    };
    (entry, payload)
}

// ----------------------------------------------------------------------------
// Transcript
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
