//! Meshroom Core
//!
//! This crate provides the room session coordinator for ephemeral peer-to-peer chat
//! rooms: session lifecycle, presence, the control protocol, the message relay and
//! matchmaking. The coordinator is a sans-io state machine; every reaction returns the
//! effects a driver must execute against a `PeerTransport`, and the events a
//! presentation layer renders.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    create_app_event_channel, create_command_channel, create_event_channel, AppEvent,
    AppEventReceiver, AppEventSender, ChannelError, Command, CommandReceiver, CommandSender,
    Effect, Event, EventReceiver, EventSender, HandleRole, NonBlockingSend,
};
pub use config::{ChannelConfig, CoordinatorConfig, RoomConfig};
pub use errors::{MeshroomError, MeshroomResult, Result, TransportError};
pub use protocol::{
    ChannelName, ControlSignal, EntryKind, MatchOffer, MatchmakingKind, MatchmakingPayload,
    MessagePayload, ProfilePayload, WirePayload,
};
pub use session::{
    ChatEntry, Outcome, PeerRecord, RoomCoordinator, RoomTarget, SenderId, Session, SessionRole,
    SessionSnapshot,
};
pub use transport::{PeerTransport, RoomHandle};
pub use types::{
    HandleId, PeerId, RoomId, RoomPassword, SystemTimeSource, TimeSource, TimerId, Timestamp,
};
