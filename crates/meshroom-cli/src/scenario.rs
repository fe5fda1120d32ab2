//! Scripted multi-peer sessions over an in-memory mesh
//!
//! Each simulated peer runs a full coordinator runtime. Its transcript is rebuilt from
//! the app events it publishes, the same way a presentation layer would do it.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use futures::future::try_join_all;
use meshroom_core::{
    AppEvent, AppEventReceiver, ChatEntry, Command, CoordinatorConfig, PeerId, RoomPassword,
    SessionSnapshot,
};
use meshroom_harness::MemoryMesh;
use meshroom_runtime::{CoordinatorBuilder, RuntimeHandle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::error::{CliError, Result};
use crate::names::animal_name;

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);
const SETTLE_MARGIN: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Host and two guests exchange messages
    Chat,
    /// Host kicks a guest, who rehosts on their own
    Kick,
    /// Host leaves and the guests rehost
    Close,
    /// Host recreates the room under a new password
    Rekey,
    /// Two strangers meet through the matchmaking lobby
    Match,
}

/// Final state of one simulated peer
#[derive(Debug, Clone, Serialize)]
pub struct PeerReport {
    pub name: String,
    pub snapshot: SessionSnapshot,
    pub transcript: Vec<ChatEntry>,
}

// ----------------------------------------------------------------------------
// Simulated Peer
// ----------------------------------------------------------------------------

struct SimPeer {
    name: String,
    runtime: RuntimeHandle,
    events: AppEventReceiver,
    transcript: Vec<ChatEntry>,
}

impl SimPeer {
    async fn start(
        mesh: &MemoryMesh,
        config: &CoordinatorConfig,
        rng: &mut StdRng,
        join: Option<&SessionSnapshot>,
    ) -> Result<Self> {
        let transport = Arc::new(mesh.random_transport(rng));
        let name = animal_name(rng);
        let mut builder = CoordinatorBuilder::new(transport)
            .with_config(config.clone())
            .with_display_name(name.clone())
            .with_rng_seed(rng.gen());
        if let Some(host) = join {
            builder = builder.join_room(host.room_id.clone(), host.password.clone());
        }

        let mut runtime = builder.build_and_start().await?;
        let events = runtime
            .take_app_event_receiver()
            .ok_or_else(|| CliError::Simulation("app event receiver already taken".into()))?;
        debug!(name = %name, peer = %runtime.peer_id(), "simulated peer started");

        Ok(Self {
            name,
            runtime,
            events,
            transcript: Vec::new(),
        })
    }

    fn peer_id(&self) -> PeerId {
        self.runtime.peer_id().clone()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.runtime.send_command(command).await?;
        Ok(())
    }

    async fn say(&self, text: &str) -> Result<()> {
        self.send(Command::SendText {
            content: text.to_string(),
        })
        .await
    }

    fn apply(&mut self, event: &AppEvent) {
        match event {
            AppEvent::TranscriptCleared => self.transcript.clear(),
            AppEvent::TranscriptAppended(entry) => self.transcript.push(entry.clone()),
            _ => {}
        }
    }

    async fn snapshot(&mut self) -> Result<SessionSnapshot> {
        self.send(Command::GetSnapshot).await?;
        let wait = async {
            while let Some(event) = self.events.recv().await {
                if let AppEvent::Snapshot(snapshot) = event {
                    return Ok(snapshot);
                }
                self.apply(&event);
            }
            Err(CliError::Simulation(format!("{} stopped publishing", self.name)))
        };
        timeout(SNAPSHOT_TIMEOUT, wait)
            .await
            .map_err(|_| CliError::Simulation(format!("{} did not answer a snapshot", self.name)))?
    }

    /// The transcript is kept as of `snapshot`; later events are discarded
    async fn finish(mut self, snapshot: SessionSnapshot) -> Result<PeerReport> {
        self.runtime.shutdown().await?;
        Ok(PeerReport {
            name: self.name,
            snapshot,
            transcript: self.transcript,
        })
    }
}

// ----------------------------------------------------------------------------
// Scenario Runner
// ----------------------------------------------------------------------------

/// Wait long enough for every deferred transition to have fired
async fn settle(config: &CoordinatorConfig) {
    sleep(config.pairing_delay() + config.eviction_delay() + SETTLE_MARGIN).await;
}

async fn room_with_guests(
    mesh: &MemoryMesh,
    config: &CoordinatorConfig,
    rng: &mut StdRng,
    guests: usize,
) -> Result<Vec<SimPeer>> {
    let mut host = SimPeer::start(mesh, config, rng, None).await?;
    let room = host.snapshot().await?;
    let mut peers = vec![host];
    for _ in 0..guests {
        peers.push(SimPeer::start(mesh, config, rng, Some(&room)).await?);
    }
    settle(config).await;
    Ok(peers)
}

pub async fn run_scenario(
    scenario: Scenario,
    config: &CoordinatorConfig,
    seed: u64,
) -> Result<Vec<PeerReport>> {
    config.validate()?;
    let mesh = MemoryMesh::new();
    let mut rng = StdRng::seed_from_u64(seed);
    info!(?scenario, seed, "running scenario");

    let mut peers = match scenario {
        Scenario::Chat => {
            let peers = room_with_guests(&mesh, config, &mut rng, 2).await?;
            for peer in &peers {
                peer.say(&format!("hello from {}", peer.name)).await?;
            }
            peers
        }
        Scenario::Kick => {
            let peers = room_with_guests(&mesh, config, &mut rng, 2).await?;
            peers[0]
                .send(Command::KickPeer {
                    peer_id: peers[1].peer_id(),
                })
                .await?;
            peers
        }
        Scenario::Close => {
            let peers = room_with_guests(&mesh, config, &mut rng, 2).await?;
            peers[0].send(Command::LeaveRoom).await?;
            peers
        }
        Scenario::Rekey => {
            let peers = room_with_guests(&mesh, config, &mut rng, 1).await?;
            peers[0]
                .send(Command::SetPassword {
                    password: Some(RoomPassword::generate(&mut rng)),
                })
                .await?;
            peers
        }
        Scenario::Match => {
            let first = SimPeer::start(&mesh, config, &mut rng, None).await?;
            let second = SimPeer::start(&mesh, config, &mut rng, None).await?;
            first.send(Command::ConnectRandom).await?;
            sleep(SETTLE_MARGIN).await;
            second.send(Command::ConnectRandom).await?;
            vec![first, second]
        }
    };
    settle(config).await;

    let stats = mesh.stats().await;
    debug!(?stats, "mesh settled");

    // Every view is taken before anyone shuts down
    let mut snapshots = Vec::with_capacity(peers.len());
    for peer in &mut peers {
        snapshots.push(peer.snapshot().await?);
    }
    try_join_all(
        peers
            .into_iter()
            .zip(snapshots)
            .map(|(peer, snapshot)| peer.finish(snapshot)),
    )
    .await
}
