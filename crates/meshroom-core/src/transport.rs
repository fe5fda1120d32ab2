//! Peer transport abstraction
//!
//! The coordinator never talks to the network. A driver opens rooms through a
//! [`PeerTransport`] and every handle it gets back pushes its peer and payload
//! events, tagged with the handle's id, into the coordinator's event channel.
//! Connection establishment, relay discovery, encryption and delivery all live
//! behind this seam.

use async_trait::async_trait;

use crate::channel::EventSender;
use crate::config::RoomConfig;
use crate::protocol::ChannelName;
use crate::types::{HandleId, PeerId, RoomId};
use crate::Result;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Opens named rooms on a peer-to-peer mesh
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Stable pseudo-random identifier the transport assigned to this process
    fn self_id(&self) -> PeerId;

    /// Join `room_id` and subscribe `events` to the new handle.
    ///
    /// Implementations return as soon as the handle exists; peers show up later as
    /// `Event::PeerJoined`. A failure here is reported by the driver as
    /// `Event::OpenFailed` and otherwise looks like an empty room.
    async fn open(
        &self,
        handle: HandleId,
        config: RoomConfig,
        room_id: RoomId,
        events: EventSender,
    ) -> Result<Box<dyn RoomHandle>>;
}

// ----------------------------------------------------------------------------
// Room Handle Trait
// ----------------------------------------------------------------------------

/// One joined room
#[async_trait]
pub trait RoomHandle: Send + Sync {
    fn id(&self) -> HandleId;

    fn room_id(&self) -> &RoomId;

    /// Best-effort send on a named channel, to `target` or to every peer.
    ///
    /// No acknowledgment; a successful return only means the payload was handed off.
    async fn send(&self, channel: ChannelName, data: Vec<u8>, target: Option<PeerId>)
        -> Result<()>;

    /// Leave the room and unsubscribe. After this returns no further event
    /// for this handle may be delivered.
    async fn leave(&mut self) -> Result<()>;
}
