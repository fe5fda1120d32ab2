//! Control signal interpretation
//!
//! Host announcements are accepted from anyone. A kick aimed at us and a room close
//! from anyone both evict us. Nothing here checks the sender, and eviction is
//! cooperative: a peer that ignores the signal stays connected.

use crate::protocol::ControlSignal;
use crate::types::PeerId;

/// Why the local session is leaving its room on someone else's request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    Kicked,
    RoomClosed,
}

impl EvictReason {
    pub fn notice(&self) -> &'static str {
        match self {
            EvictReason::Kicked => "You were kicked from the room.",
            EvictReason::RoomClosed => "The host closed the room.",
        }
    }
}

/// What the coordinator must do about a control signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Overwrite the known host
    HostAnnounced(PeerId),
    /// Leave and host a fresh room
    Evict(EvictReason),
    /// Not addressed to us
    Ignore,
}

pub fn interpret(signal: &ControlSignal, self_id: &PeerId) -> ControlOutcome {
    match signal {
        ControlSignal::HostAnnounce { host_id } => ControlOutcome::HostAnnounced(host_id.clone()),
        ControlSignal::Kick { target_id } if target_id == self_id => {
            ControlOutcome::Evict(EvictReason::Kicked)
        }
        ControlSignal::Kick { .. } => ControlOutcome::Ignore,
        ControlSignal::RoomClose => ControlOutcome::Evict(EvictReason::RoomClosed),
    }
}
