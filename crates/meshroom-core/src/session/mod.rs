//! Room session coordination
//!
//! This module contains the coordinator and the pieces it is built from:
//! - `presence`: remote peers and their display names
//! - `transcript`: chat entries, local echo and received messages
//! - `control`: host-announce, kick and room-close interpretation
//! - `matchmaking`: lobby ownership and pairing tie-break
//! - `deferred`: cancellable grace-period transitions, one slot per owned room
//! - `coordinator`: the state machine tying them together

pub mod control;
pub mod coordinator;
pub mod deferred;
pub mod matchmaking;
pub mod presence;
pub mod transcript;

pub use control::{ControlOutcome, EvictReason};
pub use coordinator::RoomCoordinator;
pub use deferred::{DeferredAction, DeferredSlot};
pub use matchmaking::Matchmaker;
pub use presence::{PeerRecord, PresenceTracker};
pub use transcript::{ChatEntry, SenderId, Transcript};

use serde::{Deserialize, Serialize};

use crate::channel::{AppEvent, Effect};
use crate::protocol::MatchOffer;
use crate::types::{HandleId, PeerId, RoomId, RoomPassword};

// ----------------------------------------------------------------------------
// Reaction Outcome
// ----------------------------------------------------------------------------

/// Everything one reaction asks the outside world to do
#[derive(Debug, Default)]
pub struct Outcome {
    /// Transport and timer effects, in execution order
    pub effects: Vec<Effect>,
    /// State changes for the presentation layer
    pub app_events: Vec<AppEvent>,
}

impl Outcome {
    pub fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn app(&mut self, event: AppEvent) {
        self.app_events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.app_events.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// How the session came to be in its room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionRole {
    /// This session created the room
    Host,
    /// This session joined an existing room
    Guest,
}

/// A room to join, with the password its peers use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTarget {
    pub room_id: RoomId,
    pub password: Option<RoomPassword>,
}

impl From<MatchOffer> for RoomTarget {
    fn from(offer: MatchOffer) -> Self {
        Self {
            room_id: offer.room_id,
            password: offer.password,
        }
    }
}

/// The room the coordinator is bound to.
///
/// Replaced wholesale whenever room identity changes; presence and transcript
/// never survive a replacement.
#[derive(Debug)]
pub struct Session {
    pub(crate) room_id: RoomId,
    pub(crate) password: Option<RoomPassword>,
    pub(crate) role: SessionRole,
    pub(crate) host_id: Option<PeerId>,
    /// Open primary handle; `None` once released
    pub(crate) handle: Option<HandleId>,
    pub(crate) presence: PresenceTracker,
    pub(crate) transcript: Transcript,
}

impl Session {
    pub(crate) fn new(
        self_id: &PeerId,
        target: RoomTarget,
        role: SessionRole,
        handle: HandleId,
        provisional_name_len: usize,
    ) -> Self {
        Self {
            room_id: target.room_id,
            password: target.password,
            role,
            host_id: match role {
                SessionRole::Host => Some(self_id.clone()),
                SessionRole::Guest => None,
            },
            handle: Some(handle),
            presence: PresenceTracker::new(self_id.clone(), provisional_name_len),
            transcript: Transcript::new(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Password to hand out of band; never part of a share link
    pub fn password(&self) -> Option<&RoomPassword> {
        self.password.as_ref()
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == SessionRole::Host
    }

    /// Last announced host; unknown for a guest until someone announces
    pub fn host_id(&self) -> Option<&PeerId> {
        self.host_id.as_ref()
    }

    pub fn handle(&self) -> Option<HandleId> {
        self.handle
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

/// Serializable view of the coordinator for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub self_id: PeerId,
    pub display_name: String,
    pub room_id: RoomId,
    pub password: Option<RoomPassword>,
    pub is_host: bool,
    pub host_id: Option<PeerId>,
    pub connected: bool,
    pub matchmaking: bool,
    pub peers: Vec<PeerRecord>,
    pub transcript_len: usize,
}

impl SessionSnapshot {
    /// Peers plus ourselves
    pub fn member_count(&self) -> usize {
        self.peers.len() + 1
    }
}
