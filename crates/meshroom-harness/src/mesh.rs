//! Memory Mesh
//!
//! Shared in-process rendezvous standing in for the relay-discovered WebRTC mesh.
//! Peers meet only when application id, room id and password all match, which is
//! how password-derived room encryption behaves from the outside.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use meshroom_core::{
    ChannelName, Event, EventSender, HandleId, MeshroomError, NonBlockingSend, PeerId,
    PeerTransport, Result, RoomConfig, RoomHandle, RoomId, TransportError,
};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Length of transport-assigned peer identifiers
pub const PEER_ID_LEN: usize = 20;

const PEER_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random identifier in the shape the browser transport hands out
pub fn random_peer_id<R: Rng + ?Sized>(rng: &mut R) -> PeerId {
    let id: String = (0..PEER_ID_LEN)
        .map(|_| PEER_ID_ALPHABET[rng.gen_range(0..PEER_ID_ALPHABET.len())] as char)
        .collect();
    PeerId::new(id)
}

// ----------------------------------------------------------------------------
// Mesh State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RoomKey {
    app_id: String,
    room_id: RoomId,
    password: Option<String>,
}

impl RoomKey {
    fn new(config: &RoomConfig, room_id: &RoomId) -> Self {
        Self {
            app_id: config.app_id.clone(),
            room_id: room_id.clone(),
            password: config.password.as_ref().map(|p| p.expose().to_string()),
        }
    }
}

#[derive(Debug)]
struct Member {
    peer_id: PeerId,
    handle: HandleId,
    events: EventSender,
}

#[derive(Debug, Default)]
struct MeshState {
    rooms: HashMap<RoomKey, Vec<Member>>,
    fail_opens: bool,
    frames_delivered: u64,
    frames_dropped: u64,
}

impl MeshState {
    fn deliver(&mut self, member: &Member, event: Event) {
        match member.events.send_or_drop(event) {
            Ok(()) => self.frames_delivered += 1,
            Err(err) => {
                self.frames_dropped += 1;
                debug!(peer = %member.peer_id, handle = %member.handle, error = %err, "mesh dropped event");
            }
        }
    }
}

/// Delivery counters, for tests and simulations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub open_rooms: usize,
    pub members: usize,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
}

// ----------------------------------------------------------------------------
// Memory Mesh
// ----------------------------------------------------------------------------

/// Shared registry of rooms. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryMesh {
    state: Arc<Mutex<MeshState>>,
}

impl MemoryMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport for a peer with a fixed identifier
    pub fn transport(&self, peer_id: PeerId) -> MemoryTransport {
        MemoryTransport {
            peer_id,
            mesh: self.clone(),
        }
    }

    /// Transport for a peer with a generated identifier
    pub fn random_transport<R: Rng + ?Sized>(&self, rng: &mut R) -> MemoryTransport {
        self.transport(random_peer_id(rng))
    }

    /// Make every subsequent `open` fail, simulating an unreachable relay
    pub async fn set_fail_opens(&self, fail: bool) {
        self.state.lock().await.fail_opens = fail;
    }

    /// Members currently in `room_id`, across every password
    pub async fn occupancy(&self, room_id: &RoomId) -> usize {
        let state = self.state.lock().await;
        state
            .rooms
            .iter()
            .filter(|(key, _)| key.room_id == *room_id)
            .map(|(_, members)| members.len())
            .sum()
    }

    pub async fn stats(&self) -> MeshStats {
        let state = self.state.lock().await;
        MeshStats {
            open_rooms: state.rooms.len(),
            members: state.rooms.values().map(Vec::len).sum(),
            frames_delivered: state.frames_delivered,
            frames_dropped: state.frames_dropped,
        }
    }
}

// ----------------------------------------------------------------------------
// Memory Transport
// ----------------------------------------------------------------------------

/// One peer's view of the mesh
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    peer_id: PeerId,
    mesh: MemoryMesh,
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    fn self_id(&self) -> PeerId {
        self.peer_id.clone()
    }

    async fn open(
        &self,
        handle: HandleId,
        config: RoomConfig,
        room_id: RoomId,
        events: EventSender,
    ) -> Result<Box<dyn RoomHandle>> {
        let mut state = self.mesh.state.lock().await;
        if state.fail_opens {
            return Err(MeshroomError::open_failed(
                room_id,
                "memory mesh is refusing connections",
            ));
        }

        let key = RoomKey::new(&config, &room_id);
        let newcomer = Member {
            peer_id: self.peer_id.clone(),
            handle,
            events,
        };

        let existing: Vec<(PeerId, HandleId, EventSender)> = state
            .rooms
            .get(&key)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.peer_id != self.peer_id)
                    .map(|m| (m.peer_id.clone(), m.handle, m.events.clone()))
                    .collect()
            })
            .unwrap_or_default();

        // Both sides learn about each other
        for (peer_id, other_handle, other_events) in existing {
            let other = Member {
                peer_id: peer_id.clone(),
                handle: other_handle,
                events: other_events,
            };
            state.deliver(
                &other,
                Event::PeerJoined {
                    handle: other_handle,
                    peer_id: self.peer_id.clone(),
                },
            );
            state.deliver(
                &newcomer,
                Event::PeerJoined {
                    handle,
                    peer_id,
                },
            );
        }

        debug!(peer = %self.peer_id, %handle, room = %room_id, "joined memory room");
        state.rooms.entry(key.clone()).or_default().push(newcomer);

        Ok(Box::new(MemoryRoomHandle {
            handle,
            room_id,
            key,
            peer_id: self.peer_id.clone(),
            mesh: self.mesh.clone(),
            joined: true,
        }))
    }
}

// ----------------------------------------------------------------------------
// Memory Room Handle
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryRoomHandle {
    handle: HandleId,
    room_id: RoomId,
    key: RoomKey,
    peer_id: PeerId,
    mesh: MemoryMesh,
    joined: bool,
}

#[async_trait]
impl RoomHandle for MemoryRoomHandle {
    fn id(&self) -> HandleId {
        self.handle
    }

    fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    async fn send(
        &self,
        channel: ChannelName,
        data: Vec<u8>,
        target: Option<PeerId>,
    ) -> Result<()> {
        if !self.joined {
            return Err(TransportError::HandleNotFound {
                handle: self.handle,
            }
            .into());
        }

        let mut state = self.mesh.state.lock().await;
        let recipients: Vec<Member> = state
            .rooms
            .get(&self.key)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.peer_id != self.peer_id)
                    .filter(|m| target.as_ref().map_or(true, |t| *t == m.peer_id))
                    .map(|m| Member {
                        peer_id: m.peer_id.clone(),
                        handle: m.handle,
                        events: m.events.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        trace!(handle = %self.handle, %channel, recipients = recipients.len(), "mesh send");
        for member in &recipients {
            state.deliver(
                member,
                Event::Received {
                    handle: member.handle,
                    channel,
                    from: self.peer_id.clone(),
                    data: data.clone(),
                },
            );
        }
        Ok(())
    }

    async fn leave(&mut self) -> Result<()> {
        if !self.joined {
            return Ok(());
        }
        self.joined = false;

        let mut state = self.mesh.state.lock().await;
        let Some(members) = state.rooms.get_mut(&self.key) else {
            return Ok(());
        };
        members.retain(|m| !(m.peer_id == self.peer_id && m.handle == self.handle));
        let remaining: Vec<Member> = members
            .iter()
            .map(|m| Member {
                peer_id: m.peer_id.clone(),
                handle: m.handle,
                events: m.events.clone(),
            })
            .collect();
        if remaining.is_empty() {
            state.rooms.remove(&self.key);
        }

        debug!(peer = %self.peer_id, handle = %self.handle, room = %self.room_id, "left memory room");
        for member in &remaining {
            state.deliver(
                member,
                Event::PeerLeft {
                    handle: member.handle,
                    peer_id: self.peer_id.clone(),
                },
            );
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use meshroom_core::{create_event_channel, ChannelConfig, CoordinatorConfig, RoomPassword};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn room(id: &str) -> RoomId {
        id.parse().unwrap()
    }

    #[tokio::test]
    async fn test_open_announces_both_sides() {
        let mesh = MemoryMesh::new();
        let config = CoordinatorConfig::default().room_config(None);
        let (a_tx, mut a_rx) = create_event_channel(&ChannelConfig::testing());
        let (b_tx, mut b_rx) = create_event_channel(&ChannelConfig::testing());

        let a = mesh.transport(PeerId::new("a"));
        let b = mesh.transport(PeerId::new("b"));
        let _ha = a
            .open(HandleId::new(1), config.clone(), room("r1"), a_tx)
            .await
            .unwrap();
        let _hb = b
            .open(HandleId::new(7), config, room("r1"), b_tx)
            .await
            .unwrap();

        assert!(matches!(
            a_rx.recv().await,
            Some(Event::PeerJoined { handle, peer_id }) if handle == HandleId::new(1) && peer_id.as_str() == "b"
        ));
        assert!(matches!(
            b_rx.recv().await,
            Some(Event::PeerJoined { handle, peer_id }) if handle == HandleId::new(7) && peer_id.as_str() == "a"
        ));
        assert_eq!(mesh.occupancy(&room("r1")).await, 2);
    }

    #[tokio::test]
    async fn test_password_partitions_room() {
        let mesh = MemoryMesh::new();
        let base = CoordinatorConfig::default();
        let (a_tx, mut a_rx) = create_event_channel(&ChannelConfig::testing());
        let (b_tx, _b_rx) = create_event_channel(&ChannelConfig::testing());

        let _ha = mesh
            .transport(PeerId::new("a"))
            .open(HandleId::new(1), base.room_config(RoomPassword::new("x")), room("r1"), a_tx)
            .await
            .unwrap();
        let _hb = mesh
            .transport(PeerId::new("b"))
            .open(HandleId::new(1), base.room_config(None), room("r1"), b_tx)
            .await
            .unwrap();

        assert!(a_rx.try_recv().is_err());
        assert_eq!(mesh.stats().await.open_rooms, 2);
    }

    #[tokio::test]
    async fn test_directed_send_and_leave() {
        let mesh = MemoryMesh::new();
        let config = CoordinatorConfig::default().room_config(None);
        let (a_tx, mut a_rx) = create_event_channel(&ChannelConfig::testing());
        let (b_tx, mut b_rx) = create_event_channel(&ChannelConfig::testing());
        let (c_tx, mut c_rx) = create_event_channel(&ChannelConfig::testing());

        let mut ha = mesh
            .transport(PeerId::new("a"))
            .open(HandleId::new(1), config.clone(), room("r1"), a_tx)
            .await
            .unwrap();
        let _hb = mesh
            .transport(PeerId::new("b"))
            .open(HandleId::new(2), config.clone(), room("r1"), b_tx)
            .await
            .unwrap();
        let _hc = mesh
            .transport(PeerId::new("c"))
            .open(HandleId::new(3), config, room("r1"), c_tx)
            .await
            .unwrap();
        while b_rx.try_recv().is_ok() {}
        while c_rx.try_recv().is_ok() {}
        while a_rx.try_recv().is_ok() {}

        ha.send(ChannelName::Profile, b"{}".to_vec(), Some(PeerId::new("b")))
            .await
            .unwrap();
        assert!(matches!(
            b_rx.try_recv(),
            Ok(Event::Received { channel: ChannelName::Profile, from, .. }) if from.as_str() == "a"
        ));
        assert!(c_rx.try_recv().is_err());

        ha.leave().await.unwrap();
        ha.leave().await.unwrap();
        assert!(matches!(b_rx.try_recv(), Ok(Event::PeerLeft { .. })));
        assert!(matches!(c_rx.try_recv(), Ok(Event::PeerLeft { .. })));
        assert!(ha.send(ChannelName::Message, Vec::new(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_opens() {
        let mesh = MemoryMesh::new();
        mesh.set_fail_opens(true).await;
        let (tx, _rx) = create_event_channel(&ChannelConfig::testing());
        let result = mesh
            .random_transport(&mut ChaCha8Rng::seed_from_u64(1))
            .open(
                HandleId::new(1),
                CoordinatorConfig::default().room_config(None),
                room("r1"),
                tx,
            )
            .await;
        assert!(matches!(
            result,
            Err(MeshroomError::Transport(TransportError::OpenFailed { .. }))
        ));
    }

    #[test]
    fn test_random_peer_id_shape() {
        let id = random_peer_id(&mut ChaCha8Rng::seed_from_u64(5));
        assert_eq!(id.len(), PEER_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
