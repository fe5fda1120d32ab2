//! Wire payloads exchanged over the transport's named channels
//!
//! Every payload is JSON with the field names peers of the browser client use, so
//! a Rust peer and a browser peer can share a room. Payloads are trusted as they
//! arrive: a frame that decodes is applied verbatim, a frame that does not is dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{PeerId, RoomId, RoomPassword, Timestamp};
use crate::Result;

// ----------------------------------------------------------------------------
// Channel Names
// ----------------------------------------------------------------------------

/// Named, typed channels multiplexed over one transport handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelName {
    /// Chat content
    Message,
    /// Display name announcements
    Profile,
    /// Host announce, kick and room close
    Control,
    /// Pairing offers, lobby handle only
    Matchmaking,
}

impl ChannelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelName::Message => "message",
            ChannelName::Profile => "profile",
            ChannelName::Control => "control",
            ChannelName::Matchmaking => "matchmaking",
        }
    }
}

impl core::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Payload Encoding
// ----------------------------------------------------------------------------

/// A payload bound to the channel it travels on
pub trait WirePayload: Serialize + DeserializeOwned {
    const CHANNEL: ChannelName;

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

// ----------------------------------------------------------------------------
// Message Channel
// ----------------------------------------------------------------------------

/// Kind of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Text,
    System,
}

/// Chat content as broadcast to the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,
    pub sender_name: String,
    pub timestamp: Timestamp,
}

impl WirePayload for MessagePayload {
    const CHANNEL: ChannelName = ChannelName::Message;
}

// ----------------------------------------------------------------------------
// Profile Channel
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub name: String,
}

impl WirePayload for ProfilePayload {
    const CHANNEL: ChannelName = ChannelName::Profile;
}

// ----------------------------------------------------------------------------
// Control Channel
// ----------------------------------------------------------------------------

/// Room control signals. None of them is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlSignal {
    Kick {
        #[serde(rename = "targetId")]
        target_id: PeerId,
    },
    RoomClose,
    HostAnnounce {
        #[serde(rename = "hostId")]
        host_id: PeerId,
    },
}

impl WirePayload for ControlSignal {
    const CHANNEL: ChannelName = ChannelName::Control;
}

// ----------------------------------------------------------------------------
// Matchmaking Channel
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchmakingKind {
    Seek,
    Match,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakingPayload {
    #[serde(rename = "type")]
    pub kind: MatchmakingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl WirePayload for MatchmakingPayload {
    const CHANNEL: ChannelName = ChannelName::Matchmaking;
}

/// Private room an initiator hands to the peer it paired with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOffer {
    pub room_id: RoomId,
    pub password: Option<RoomPassword>,
}

impl MatchmakingPayload {
    pub fn offer(offer: &MatchOffer) -> Self {
        Self {
            kind: MatchmakingKind::Match,
            room_id: Some(offer.room_id.clone()),
            password: offer.password.as_ref().map(|pw| pw.expose().to_string()),
        }
    }

    /// The offer carried by a `match` payload; seeks and room-less matches carry none
    pub fn into_offer(self) -> Option<MatchOffer> {
        match (self.kind, self.room_id) {
            (MatchmakingKind::Match, Some(room_id)) => Some(MatchOffer {
                room_id,
                password: self.password.and_then(RoomPassword::new),
            }),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
