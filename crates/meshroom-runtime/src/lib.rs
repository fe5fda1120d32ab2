//! Meshroom Runtime
//!
//! This crate runs a `RoomCoordinator` on its own tokio task:
//! - `CoordinatorTask`: the select loop executing coordinator effects against a
//!   `PeerTransport`
//! - `TimerTable`: cancellable timers for deferred room transitions
//! - `CoordinatorBuilder` / `RuntimeHandle`: construction and control from the outside

pub mod builder;
pub mod task;
pub mod timers;

pub use builder::{CoordinatorBuilder, RuntimeHandle};
pub use task::{CoordinatorTask, TaskStats};
pub use timers::TimerTable;

// Re-export core types for convenience
pub use meshroom_core::{
    AppEvent, AppEventReceiver, ChatEntry, Command, CommandSender, CoordinatorConfig,
    MeshroomError, MeshroomResult, PeerId, PeerRecord, PeerTransport, RoomId, RoomPassword,
    SessionSnapshot,
};
