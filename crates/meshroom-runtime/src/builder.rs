//! Runtime Builder API
//!
//! Provides a builder-style API for consumers (CLI, tests) to wire a coordinator to a
//! peer transport and get command and app-event handles back.

use std::sync::Arc;
use std::time::Duration;

use meshroom_core::{
    create_app_event_channel, create_command_channel, create_event_channel, AppEventReceiver,
    Command, CommandSender, CoordinatorConfig, MeshroomError, PeerId, PeerTransport, Result,
    RoomCoordinator, RoomId, RoomPassword, RoomTarget, SystemTimeSource,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tracing::info;

use crate::task::{CoordinatorTask, TaskStats};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Coordinator Builder
// ----------------------------------------------------------------------------

/// Builder for a coordinator running on its own tokio task
pub struct CoordinatorBuilder {
    transport: Arc<dyn PeerTransport>,
    config: CoordinatorConfig,
    display_name: Option<String>,
    initial_room: Option<RoomTarget>,
    rng_seed: Option<u64>,
}

impl CoordinatorBuilder {
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            transport,
            config: CoordinatorConfig::default(),
            display_name: None,
            initial_room: None,
            rng_seed: None,
        }
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Name announced to peers; defaults to the short form of our peer id
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Join this room as a guest on start instead of hosting a new one
    pub fn join_room(mut self, room_id: RoomId, password: Option<RoomPassword>) -> Self {
        self.initial_room = Some(RoomTarget { room_id, password });
        self
    }

    /// Seed the room id and password generator, for reproducible runs
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the coordinator and spawn its task
    pub async fn build_and_start(self) -> Result<RuntimeHandle> {
        let peer_id = self.transport.self_id();
        let display_name = self
            .display_name
            .unwrap_or_else(|| peer_id.short(self.config.provisional_name_len));
        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let channels = self.config.channels.clone();
        let (command_sender, command_receiver) = create_command_channel(&channels);
        let (event_sender, event_receiver) = create_event_channel(&channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&channels);

        let coordinator = RoomCoordinator::new(
            peer_id.clone(),
            display_name.clone(),
            self.config,
            SystemTimeSource,
            rng,
        )?;
        let task = CoordinatorTask::new(
            coordinator,
            self.transport,
            self.initial_room,
            command_receiver,
            event_receiver,
            event_sender,
            app_event_sender,
        );

        let task_handle = tokio::spawn(task.run());
        info!(peer = %peer_id, name = %display_name, "meshroom runtime started");

        Ok(RuntimeHandle {
            peer_id,
            command_sender,
            app_event_receiver: Some(app_event_receiver),
            task_handle: Some(task_handle),
            running: true,
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running coordinator task
pub struct RuntimeHandle {
    peer_id: PeerId,
    command_sender: CommandSender,
    app_event_receiver: Option<AppEventReceiver>,
    task_handle: Option<JoinHandle<Result<TaskStats>>>,
    running: bool,
}

impl RuntimeHandle {
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Get a command sender for sending commands to the coordinator
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    pub async fn send_command(&self, command: Command) -> Result<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| MeshroomError::channel_error("Failed to send command to coordinator"))
    }

    pub fn is_running(&self) -> bool {
        self.running
            && self
                .task_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the coordinator task to finish on its own
    pub async fn wait(&mut self) -> Result<TaskStats> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(TaskStats::default());
        };
        self.running = false;
        handle
            .await
            .map_err(|e| MeshroomError::channel_error(format!("Coordinator task panicked: {}", e)))?
    }

    /// Release every room and stop the coordinator task
    pub async fn shutdown(&mut self) -> Result<TaskStats> {
        info!(peer = %self.peer_id, "shutting down meshroom runtime");
        let _ = self.send_command(Command::Shutdown).await;

        let Some(handle) = self.task_handle.take() else {
            return Ok(TaskStats::default());
        };
        self.running = false;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(MeshroomError::channel_error(format!(
                "Coordinator task panicked: {}",
                e
            ))),
            Err(_) => Err(MeshroomError::channel_error(
                "Coordinator task did not stop in time",
            )),
        }
    }
}
