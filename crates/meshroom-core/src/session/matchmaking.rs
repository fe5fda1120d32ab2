//! Matchmaking through the public lobby
//!
//! Two seekers meet in the lobby. The one whose identifier sorts first initiates:
//! it invents a private room and password, sends them to the other side, and both
//! move there after the settle delay. With more than two seekers present every pair
//! satisfies the tie-break independently and concurrent offers are not deduplicated.
//! A seeker keeps one pending pairing: a later offer, sent or received, replaces an
//! earlier one that has not fired yet, so the last offer wins locally while the
//! other side of the replaced offer moves into its private room alone.

use rand::Rng;

use crate::protocol::MatchOffer;
use crate::types::{HandleId, PeerId, RoomId, RoomPassword};

/// Lobby handle ownership, independent of the primary room
#[derive(Debug, Default)]
pub struct Matchmaker {
    lobby: Option<HandleId>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.lobby.is_some()
    }

    pub fn lobby_handle(&self) -> Option<HandleId> {
        self.lobby
    }

    pub fn begin(&mut self, handle: HandleId) {
        self.lobby = Some(handle);
    }

    /// Stop matchmaking, returning the lobby handle to release
    pub fn end(&mut self) -> Option<HandleId> {
        self.lobby.take()
    }
}

/// Deterministic tie-break: the lexicographically smaller identifier initiates
pub fn is_initiator(self_id: &PeerId, other: &PeerId) -> bool {
    self_id < other
}

/// Fresh private room for a pairing
pub fn create_offer<R: Rng + ?Sized>(rng: &mut R) -> MatchOffer {
    MatchOffer {
        room_id: RoomId::generate(rng),
        password: Some(RoomPassword::generate(rng)),
    }
}
