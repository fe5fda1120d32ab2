//! Coordinator Task
//!
//! Owns one `RoomCoordinator` and is the only place its effects meet the outside
//! world. Commands and events are processed strictly one at a time; the effects of a
//! reaction are executed in order before the next message is received.

use std::collections::HashMap;
use std::sync::Arc;

use meshroom_core::{
    AppEvent, AppEventSender, ChannelError, Command, CommandReceiver, Effect, Event,
    EventReceiver, EventSender, HandleId, NonBlockingSend, Outcome, PeerTransport, Result,
    RoomCoordinator, RoomHandle, RoomTarget, TimeSource,
};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::timers::TimerTable;

// ----------------------------------------------------------------------------
// Task Statistics
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub effects_executed: u64,
    pub transport_errors: u64,
    pub app_events_dropped: u64,
}

// ----------------------------------------------------------------------------
// Coordinator Task
// ----------------------------------------------------------------------------

/// Drives a coordinator from its command and event channels
pub struct CoordinatorTask<T: TimeSource, R: Rng> {
    coordinator: RoomCoordinator<T, R>,
    transport: Arc<dyn PeerTransport>,
    /// Room to join on start; hosts a generated room when `None`
    initial_room: Option<RoomTarget>,
    command_receiver: CommandReceiver,
    event_receiver: EventReceiver,
    /// Handed to every opened room and timer
    event_sender: EventSender,
    app_event_sender: AppEventSender,
    handles: HashMap<HandleId, Box<dyn RoomHandle>>,
    timers: TimerTable,
    stats: TaskStats,
    running: bool,
}

impl<T: TimeSource, R: Rng> CoordinatorTask<T, R> {
    pub fn new(
        coordinator: RoomCoordinator<T, R>,
        transport: Arc<dyn PeerTransport>,
        initial_room: Option<RoomTarget>,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        event_sender: EventSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            coordinator,
            transport,
            initial_room,
            command_receiver,
            event_receiver,
            event_sender,
            app_event_sender,
            handles: HashMap::new(),
            timers: TimerTable::new(),
            stats: TaskStats::default(),
            running: true,
        }
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    /// Run until `Command::Shutdown` or until every command sender is dropped
    pub async fn run(mut self) -> Result<TaskStats> {
        info!(peer = %self.coordinator.self_id(), "coordinator task starting");

        let outcome = self.coordinator.start(self.initial_room.take());
        self.dispatch(outcome).await;

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    let command = command.unwrap_or_else(|| {
                        info!("command channel closed, shutting down");
                        Command::Shutdown
                    });
                    self.process_command(command).await;
                }

                // We hold a sender ourselves, so this channel never closes
                Some(event) = self.event_receiver.recv() => {
                    self.process_event(event).await;
                }
            }
        }

        self.release_all().await;
        info!(stats = ?self.stats, "coordinator task stopped");
        Ok(self.stats)
    }

    async fn process_command(&mut self, command: Command) {
        self.stats.commands_processed += 1;
        let shutdown = matches!(command, Command::Shutdown);

        let outcome = self.coordinator.handle_command(command);
        self.dispatch(outcome).await;

        if shutdown {
            self.running = false;
        }
    }

    async fn process_event(&mut self, event: Event) {
        self.stats.events_processed += 1;
        let outcome = self.coordinator.handle_event(event);
        self.dispatch(outcome).await;
    }

    /// Execute effects in order, then publish app events
    async fn dispatch(&mut self, outcome: Outcome) {
        for effect in outcome.effects {
            self.execute(effect).await;
        }
        for app_event in outcome.app_events {
            self.publish(app_event);
        }
    }

    async fn execute(&mut self, effect: Effect) {
        self.stats.effects_executed += 1;
        match effect {
            Effect::OpenRoom {
                handle,
                role,
                room_id,
                config,
            } => {
                debug!(%handle, %role, room = %room_id, "opening room");
                let opened = self
                    .transport
                    .open(handle, config, room_id.clone(), self.event_sender.clone())
                    .await;
                match opened {
                    Ok(room) => {
                        self.handles.insert(handle, room);
                    }
                    Err(err) => {
                        self.stats.transport_errors += 1;
                        warn!(%handle, %role, room = %room_id, error = %err, "failed to open room");
                        let failed = Event::OpenFailed {
                            handle,
                            reason: err.to_string(),
                        };
                        if let Err(err) = self.event_sender.send_or_drop(failed) {
                            warn!(%handle, error = %err, "could not report open failure");
                        }
                    }
                }
            }
            Effect::ReleaseRoom { handle } => match self.handles.remove(&handle) {
                Some(mut room) => {
                    debug!(%handle, room = %room.room_id(), "releasing room");
                    if let Err(err) = room.leave().await {
                        self.stats.transport_errors += 1;
                        warn!(%handle, error = %err, "failed to leave room");
                    }
                }
                None => debug!(%handle, "release of a handle that never opened"),
            },
            Effect::Send {
                handle,
                channel,
                data,
                target,
            } => match self.handles.get(&handle) {
                Some(room) => {
                    if let Err(err) = room.send(channel, data, target).await {
                        self.stats.transport_errors += 1;
                        warn!(%handle, %channel, error = %err, "send failed");
                    }
                }
                None => debug!(%handle, %channel, "send on a handle that never opened"),
            },
            Effect::ScheduleTimer { timer, delay } => {
                self.timers.schedule(timer, delay, self.event_sender.clone());
            }
            Effect::CancelTimer { timer } => self.timers.cancel(timer),
        }
    }

    fn publish(&mut self, app_event: AppEvent) {
        match self.app_event_sender.send_or_drop(app_event) {
            Ok(()) => {}
            Err(ChannelError::ChannelFull) => {
                self.stats.app_events_dropped += 1;
                warn!("app event channel full, dropping update");
            }
            // Nobody is listening; the coordinator keeps running headless
            Err(ChannelError::ChannelClosed) => {
                self.stats.app_events_dropped += 1;
            }
        }
    }

    /// Leave anything still open after shutdown
    async fn release_all(&mut self) {
        self.timers.cancel_all();
        for (handle, mut room) in self.handles.drain() {
            debug!(%handle, "releasing leftover room");
            if let Err(err) = room.leave().await {
                warn!(%handle, error = %err, "failed to leave room during shutdown");
            }
        }
    }
}
