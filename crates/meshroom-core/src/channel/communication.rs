//! CSP Channel Communication Protocol Types
//!
//! This module defines the typed communication protocol around the coordinator.
//! All inter-task communication flows through these channel message types.

use core::fmt;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RoomConfig;
use crate::protocol::ChannelName;
use crate::session::{ChatEntry, PeerRecord, SessionSnapshot};
use crate::types::{HandleId, PeerId, RoomId, RoomPassword, TimerId};

// ----------------------------------------------------------------------------
// Command: Caller → Coordinator
// ----------------------------------------------------------------------------

/// Commands sent from the presentation layer to the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Append a chat message locally and broadcast it
    SendText { content: String },
    /// Ask a peer to leave the room (host only)
    KickPeer { peer_id: PeerId },
    /// Leave the current room and host a fresh one
    LeaveRoom,
    /// Join an existing room as a guest
    JoinRoom {
        room_id: RoomId,
        password: Option<RoomPassword>,
    },
    /// Recreate the current room under a new password (host only)
    SetPassword { password: Option<RoomPassword> },
    /// Look for a random partner in the public lobby
    ConnectRandom,
    /// Stop looking for a partner
    CancelMatchmaking,
    /// Request a snapshot of the current session
    GetSnapshot,
    /// Release every handle and stop
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Transport and Timers → Coordinator
// ----------------------------------------------------------------------------

/// Events delivered to the coordinator by transport handles and deferred timers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A remote peer became reachable on a handle
    PeerJoined { handle: HandleId, peer_id: PeerId },
    /// A remote peer is gone from a handle
    PeerLeft { handle: HandleId, peer_id: PeerId },
    /// A payload arrived on one of the handle's channels
    Received {
        handle: HandleId,
        channel: ChannelName,
        from: PeerId,
        data: Vec<u8>,
    },
    /// The transport could not open a handle
    OpenFailed { handle: HandleId, reason: String },
    /// A deferred transition is due
    TimerFired { timer: TimerId },
}

impl Event {
    /// Handle the event belongs to, if it came from the transport
    pub fn handle(&self) -> Option<HandleId> {
        match self {
            Event::PeerJoined { handle, .. }
            | Event::PeerLeft { handle, .. }
            | Event::Received { handle, .. }
            | Event::OpenFailed { handle, .. } => Some(*handle),
            Event::TimerFired { .. } => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Effect: Coordinator → Driver (External Side Effects Only)
// ----------------------------------------------------------------------------

/// Which resource a transport handle backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleRole {
    /// The room the session is bound to
    Primary,
    /// The public matchmaking lobby
    Lobby,
}

impl fmt::Display for HandleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleRole::Primary => write!(f, "primary"),
            HandleRole::Lobby => write!(f, "lobby"),
        }
    }
}

/// Effects the driver executes, in order, after each reaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    /// Open a transport handle for a room
    OpenRoom {
        handle: HandleId,
        role: HandleRole,
        room_id: RoomId,
        config: RoomConfig,
    },
    /// Leave the room and unsubscribe from the handle
    ReleaseRoom { handle: HandleId },
    /// Send a payload, to one peer or to everyone on the handle
    Send {
        handle: HandleId,
        channel: ChannelName,
        data: Vec<u8>,
        target: Option<PeerId>,
    },
    /// Deliver `Event::TimerFired` after the delay unless cancelled
    ScheduleTimer { timer: TimerId, delay: Duration },
    /// Cancel a scheduled timer
    CancelTimer { timer: TimerId },
}

// ----------------------------------------------------------------------------
// AppEvent: Coordinator → Presentation (State Changes Only)
// ----------------------------------------------------------------------------

/// Application events describing state changes the presentation layer renders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Room identity, role or connectivity changed
    SessionChanged(SessionSnapshot),
    /// The transcript was reset because the session was replaced
    TranscriptCleared,
    /// An entry was appended to the transcript
    TranscriptAppended(ChatEntry),
    /// The set of visible peers or their names changed
    PresenceChanged { peers: Vec<PeerRecord> },
    /// A host announcement was accepted
    HostChanged { host_id: Option<PeerId> },
    /// Matchmaking started or stopped
    MatchmakingChanged { active: bool },
    /// Reply to `Command::GetSnapshot`
    Snapshot(SessionSnapshot),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
