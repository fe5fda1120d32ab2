//! Integration Tests for the coordinator runtime
//!
//! Runs several coordinators on their own tasks over a shared memory mesh, with real
//! timers, and observes them only through their app events.

use std::sync::Arc;
use std::time::Duration;

use meshroom_core::{AppEvent, AppEventReceiver, Command, CoordinatorConfig, PeerId, SessionSnapshot};
use meshroom_harness::MemoryMesh;
use meshroom_runtime::{CoordinatorBuilder, RuntimeHandle};
use tokio::time::timeout;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

struct TestPeer {
    runtime: RuntimeHandle,
    events: AppEventReceiver,
}

impl TestPeer {
    async fn start(mesh: &MemoryMesh, id: &str, name: &str, join: Option<&SessionSnapshot>) -> Self {
        let transport = Arc::new(mesh.transport(PeerId::new(id)));
        let mut builder = CoordinatorBuilder::new(transport)
            .with_config(CoordinatorConfig::testing())
            .with_display_name(name)
            .with_rng_seed(id.len() as u64 + id.bytes().map(u64::from).sum::<u64>());
        if let Some(host) = join {
            builder = builder.join_room(host.room_id.clone(), host.password.clone());
        }

        let mut runtime = builder.build_and_start().await.expect("runtime starts");
        let events = runtime.take_app_event_receiver().expect("receiver available");
        Self { runtime, events }
    }

    async fn send(&self, command: Command) {
        self.runtime.send_command(command).await.expect("command accepted");
    }

    /// Skip app events until one matches
    async fn wait_for<F>(&mut self, mut predicate: F) -> AppEvent
    where
        F: FnMut(&AppEvent) -> bool,
    {
        timeout(EVENT_TIMEOUT, async {
            loop {
                match self.events.recv().await {
                    Some(event) if predicate(&event) => return event,
                    Some(_) => continue,
                    None => panic!("app event channel closed"),
                }
            }
        })
        .await
        .expect("expected app event did not arrive")
    }

    async fn wait_for_notice(&mut self, text: &str) {
        self.wait_for(|e| matches!(e, AppEvent::TranscriptAppended(entry) if entry.content == text))
            .await;
    }

    async fn snapshot(&mut self) -> SessionSnapshot {
        self.send(Command::GetSnapshot).await;
        match self.wait_for(|e| matches!(e, AppEvent::Snapshot(_))).await {
            AppEvent::Snapshot(snapshot) => snapshot,
            _ => unreachable!(),
        }
    }
}

async fn host_and_guest(mesh: &MemoryMesh) -> (TestPeer, TestPeer) {
    let mut alice = TestPeer::start(mesh, "alice-0001", "Alice", None).await;
    let room = alice.snapshot().await;
    let mut bob = TestPeer::start(mesh, "bob-0002", "Bob", Some(&room)).await;

    alice
        .wait_for(|e| {
            matches!(e, AppEvent::PresenceChanged { peers }
                if peers.iter().any(|p| p.name == "Bob"))
        })
        .await;
    bob.wait_for(|e| matches!(e, AppEvent::HostChanged { host_id: Some(_) }))
        .await;
    (alice, bob)
}

// ----------------------------------------------------------------------------
// Room Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_guest_joins_host_over_mesh() {
    let mesh = MemoryMesh::new();
    let (mut alice, mut bob) = host_and_guest(&mesh).await;

    let alice_view = alice.snapshot().await;
    let bob_view = bob.snapshot().await;
    assert_eq!(alice_view.room_id, bob_view.room_id);
    assert!(alice_view.is_host);
    assert!(!bob_view.is_host);
    assert_eq!(bob_view.host_id, Some(PeerId::new("alice-0001")));
    assert_eq!(alice_view.member_count(), 2);
    assert_eq!(mesh.occupancy(&alice_view.room_id).await, 2);
}

#[tokio::test]
async fn test_chat_round_trip() {
    let mesh = MemoryMesh::new();
    let (mut alice, bob) = host_and_guest(&mesh).await;

    bob.send(Command::SendText {
        content: "hello alice".to_string(),
    })
    .await;

    let event = alice
        .wait_for(|e| matches!(e, AppEvent::TranscriptAppended(entry) if entry.content == "hello alice"))
        .await;
    if let AppEvent::TranscriptAppended(entry) = event {
        assert_eq!(entry.sender_name, "Bob");
    }
}

#[tokio::test]
async fn test_kicked_guest_rehosts_after_grace_period() {
    let mesh = MemoryMesh::new();
    let (mut alice, mut bob) = host_and_guest(&mesh).await;
    let room = alice.snapshot().await.room_id;

    alice
        .send(Command::KickPeer {
            peer_id: PeerId::new("bob-0002"),
        })
        .await;

    bob.wait_for_notice("You were kicked from the room.").await;
    bob.wait_for_notice("You are now in your own room as host.")
        .await;
    alice.wait_for_notice("Bob was kicked.").await;

    let bob_view = bob.snapshot().await;
    assert!(bob_view.is_host);
    assert!(bob_view.connected);
    assert_ne!(bob_view.room_id, room);
    assert_eq!(mesh.occupancy(&room).await, 1);
}

#[tokio::test]
async fn test_host_leave_closes_room() {
    let mesh = MemoryMesh::new();
    let (mut alice, mut bob) = host_and_guest(&mesh).await;
    let room = alice.snapshot().await.room_id;

    alice.send(Command::LeaveRoom).await;
    bob.wait_for_notice("The host closed the room.").await;
    bob.wait_for_notice("You are now in your own room as host.")
        .await;

    let alice_view = alice.snapshot().await;
    let bob_view = bob.snapshot().await;
    assert_ne!(alice_view.room_id, room);
    assert_ne!(bob_view.room_id, room);
    assert_ne!(alice_view.room_id, bob_view.room_id);
    assert_eq!(mesh.occupancy(&room).await, 0);
}

// ----------------------------------------------------------------------------
// Matchmaking
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_random_matchmaking_over_mesh() {
    let mesh = MemoryMesh::new();
    let mut a = TestPeer::start(&mesh, "aaa", "Alice", None).await;
    let mut b = TestPeer::start(&mesh, "bbb", "Bob", None).await;

    a.send(Command::ConnectRandom).await;
    a.wait_for(|e| matches!(e, AppEvent::MatchmakingChanged { active: true }))
        .await;
    b.send(Command::ConnectRandom).await;

    for peer in [&mut a, &mut b] {
        peer.wait_for(|e| matches!(e, AppEvent::MatchmakingChanged { active: false }))
            .await;
    }
    b.wait_for(|e| matches!(e, AppEvent::HostChanged { host_id: Some(h) } if h.as_str() == "aaa"))
        .await;

    let a_view = a.snapshot().await;
    let b_view = b.snapshot().await;
    assert_eq!(a_view.room_id, b_view.room_id);
    assert!(a_view.is_host);
    assert!(!b_view.is_host);
    assert!(a_view.password.is_some());
    assert!(!a_view.matchmaking && !b_view.matchmaking);
    assert_eq!(mesh.stats().await.members, 2);
}

// ----------------------------------------------------------------------------
// Failure Handling
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_unreachable_transport_looks_like_empty_room() {
    let mesh = MemoryMesh::new();
    mesh.set_fail_opens(true).await;

    let mut alice = TestPeer::start(&mesh, "alice-0001", "Alice", None).await;
    alice
        .send(Command::SendText {
            content: "anyone?".to_string(),
        })
        .await;
    alice
        .wait_for(|e| matches!(e, AppEvent::TranscriptAppended(entry) if entry.content == "anyone?"))
        .await;

    let view = alice.snapshot().await;
    assert!(view.is_host);
    assert!(view.peers.is_empty());

    let stats = alice.runtime.shutdown().await.expect("clean shutdown");
    assert!(stats.transport_errors >= 1);
}

#[tokio::test]
async fn test_shutdown_releases_all_rooms() {
    let mesh = MemoryMesh::new();
    let (mut alice, mut bob) = host_and_guest(&mesh).await;
    alice.send(Command::ConnectRandom).await;
    alice
        .wait_for(|e| matches!(e, AppEvent::MatchmakingChanged { active: true }))
        .await;

    alice.runtime.shutdown().await.expect("alice shuts down");
    bob.runtime.shutdown().await.expect("bob shuts down");
    assert!(!alice.runtime.is_running());
    assert_eq!(mesh.stats().await.members, 0);
}
