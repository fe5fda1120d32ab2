//! Channel Module
//!
//! This module contains the CSP (Communicating Sequential Processes) channel infrastructure:
//! - `communication`: Command, Event, Effect and AppEvent types
//! - `utils`: Channel aliases, constructors and the non-blocking send helper

pub mod communication;
pub mod utils;

pub use communication::{AppEvent, Command, Effect, Event, HandleRole};

pub use utils::{
    create_app_event_channel, create_command_channel, create_event_channel, AppEventReceiver,
    AppEventSender, ChannelError, CommandReceiver, CommandSender, EventReceiver, EventSender,
    NonBlockingSend,
};
