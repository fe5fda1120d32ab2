//! Peer presence tracking
//!
//! Join events and profile payloads race each other. Whichever arrives first
//! creates the record; a profile always overwrites the name and a join never does,
//! so both orders converge on the same record.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::PeerId;

/// A remote member of the current room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: PeerId,
    pub name: String,
}

/// Locally observed set of remote peers, in first-seen order.
///
/// The local identity is never stored; total membership is `len() + 1`.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    self_id: PeerId,
    provisional_name_len: usize,
    peers: SmallVec<[PeerRecord; 8]>,
}

impl PresenceTracker {
    pub fn new(self_id: PeerId, provisional_name_len: usize) -> Self {
        Self {
            self_id,
            provisional_name_len,
            peers: SmallVec::new(),
        }
    }

    /// Record a transport join. Returns `true` if a placeholder record was inserted.
    pub fn observe_join(&mut self, id: &PeerId) -> bool {
        if *id == self.self_id || self.contains(id) {
            return false;
        }
        self.peers.push(PeerRecord {
            id: id.clone(),
            name: id.short(self.provisional_name_len),
        });
        true
    }

    /// Apply a profile payload, last write wins. Returns `true` if anything changed.
    pub fn apply_profile(&mut self, id: &PeerId, name: String) -> bool {
        if *id == self.self_id {
            return false;
        }
        match self.peers.iter_mut().find(|peer| peer.id == *id) {
            Some(existing) if existing.name == name => false,
            Some(existing) => {
                existing.name = name;
                true
            }
            None => {
                self.peers.push(PeerRecord {
                    id: id.clone(),
                    name,
                });
                true
            }
        }
    }

    /// Drop a peer, returning its record if it was known
    pub fn remove(&mut self, id: &PeerId) -> Option<PeerRecord> {
        let index = self.peers.iter().position(|peer| peer.id == *id)?;
        Some(self.peers.remove(index))
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerRecord> {
        self.peers.iter().find(|peer| peer.id == *id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.get(id).is_some()
    }

    pub fn peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Remote peers plus the local identity
    pub fn member_count(&self) -> usize {
        self.peers.len() + 1
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
