//! Room coordinator state machine
//!
//! One `RoomCoordinator` owns the session of one process. Every call to `start`,
//! `handle_command` or `handle_event` is one atomic reaction; the returned
//! `Outcome` lists the effects a driver must execute in order and the app events
//! the presentation layer should see. The coordinator never performs I/O itself.
//!
//! Room identity: `Unbound → Bound(host | guest)`, and from `Bound` only ever to a
//! freshly constructed `Bound`. Every rebind releases the previous primary handle
//! before opening the next one. Between an eviction and its recreate the primary
//! handle is released but a recreate is always pending.
//!
//! The primary room and the lobby each own a deferred slot. A room change only
//! cancels the primary's pending recreate; a pairing supersedes that recreate only
//! when it fires and binds the paired room.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::channel::{AppEvent, Command, Effect, Event, HandleRole};
use crate::config::CoordinatorConfig;
use crate::protocol::{
    ChannelName, ControlSignal, MatchmakingPayload, MessagePayload, ProfilePayload, WirePayload,
};
use crate::session::control::{self, ControlOutcome, EvictReason};
use crate::session::deferred::{DeferredAction, DeferredSlot};
use crate::session::matchmaking::{self, Matchmaker};
use crate::session::transcript::{self, ChatEntry};
use crate::session::{Outcome, RoomTarget, Session, SessionRole, SessionSnapshot};
use crate::types::{HandleId, PeerId, RoomId, RoomPassword, TimeSource, TimerId, Timestamp};
use crate::{MeshroomError, Result};

const PEER_CONNECTED_NOTICE: &str = "A peer connected.";
const REHOSTED_NOTICE: &str = "You are now in your own room as host.";

/// Which owned handle an incoming event belongs to
enum Route {
    Primary,
    Lobby,
    /// Released or never ours
    Stale,
}

// ----------------------------------------------------------------------------
// Room Coordinator
// ----------------------------------------------------------------------------

/// Sans-io coordinator for room membership, presence, control, chat and matchmaking
pub struct RoomCoordinator<T: TimeSource, R: Rng> {
    /// Identifier the transport assigned to this process
    self_id: PeerId,
    /// Caller-supplied display name, announced to every peer that joins
    display_name: String,
    config: CoordinatorConfig,
    lobby_room: RoomId,
    /// `None` until `start` binds the first room
    session: Option<Session>,
    matchmaker: Matchmaker,
    /// Recreate after being kicked or closed out
    eviction: DeferredSlot,
    /// Move into the paired room
    pairing: DeferredSlot,
    next_handle: HandleId,
    next_timer: TimerId,
    time_source: T,
    rng: R,
}

impl<T: TimeSource, R: Rng> RoomCoordinator<T, R> {
    pub fn new(
        self_id: PeerId,
        display_name: impl Into<String>,
        config: CoordinatorConfig,
        time_source: T,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;
        let lobby_room: RoomId = config
            .lobby_room
            .parse()
            .map_err(|_| MeshroomError::config_error("lobby_room is not a valid room id"))?;

        Ok(Self {
            self_id,
            display_name: display_name.into(),
            config,
            lobby_room,
            session: None,
            matchmaker: Matchmaker::new(),
            eviction: DeferredSlot::new(),
            pairing: DeferredSlot::new(),
            next_handle: HandleId::new(1),
            next_timer: TimerId::new(1),
            time_source,
            rng,
        })
    }

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_matchmaking(&self) -> bool {
        self.matchmaker.is_active()
    }

    pub fn lobby_handle(&self) -> Option<HandleId> {
        self.matchmaker.lobby_handle()
    }

    pub fn pending_eviction(&self) -> Option<&DeferredAction> {
        self.eviction.pending()
    }

    pub fn pending_pairing(&self) -> Option<&DeferredAction> {
        self.pairing.pending()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let session = self.session.as_ref()?;
        Some(SessionSnapshot {
            self_id: self.self_id.clone(),
            display_name: self.display_name.clone(),
            room_id: session.room_id.clone(),
            password: session.password.clone(),
            is_host: session.is_host(),
            host_id: session.host_id.clone(),
            connected: session.is_connected(),
            matchmaking: self.matchmaker.is_active(),
            peers: session.presence.peers().to_vec(),
            transcript_len: session.transcript.len(),
        })
    }

    // ------------------------------------------------------------------------
    // Reactions
    // ------------------------------------------------------------------------

    /// Bind the first room: join `initial` as a guest, or host a generated room
    pub fn start(&mut self, initial: Option<RoomTarget>) -> Outcome {
        let mut out = Outcome::default();
        if self.session.is_some() {
            warn!("coordinator already bound to a room; ignoring start");
            return out;
        }
        match initial {
            Some(target) => self.bind(target, SessionRole::Guest, &mut out),
            None => self.create_as_host(None, None, &mut out),
        }
        out
    }

    pub fn handle_command(&mut self, command: Command) -> Outcome {
        debug!(?command, "handling command");
        let mut out = Outcome::default();
        match command {
            Command::SendText { content } => self.send_text(content, &mut out),
            Command::KickPeer { peer_id } => self.kick(peer_id, &mut out),
            Command::LeaveRoom => self.leave(&mut out),
            Command::JoinRoom { room_id, password } => {
                self.join_room(RoomTarget { room_id, password }, &mut out)
            }
            Command::SetPassword { password } => self.set_password(password, &mut out),
            Command::ConnectRandom => self.connect_random(&mut out),
            Command::CancelMatchmaking => self.cancel_matchmaking(&mut out),
            Command::GetSnapshot => {
                if let Some(snapshot) = self.snapshot() {
                    out.app(AppEvent::Snapshot(snapshot));
                }
            }
            Command::Shutdown => self.shutdown(&mut out),
        }
        out
    }

    pub fn handle_event(&mut self, event: Event) -> Outcome {
        let mut out = Outcome::default();

        if let Event::PeerJoined { peer_id, .. }
        | Event::PeerLeft { peer_id, .. }
        | Event::Received { from: peer_id, .. } = &event
        {
            if *peer_id == self.self_id {
                debug!("ignoring transport event about ourselves");
                return out;
            }
        }

        match event {
            Event::TimerFired { timer } => self.on_timer(timer, &mut out),
            Event::OpenFailed { handle, reason } => {
                warn!(%handle, %reason, "transport could not open room; it will look empty");
            }
            Event::PeerJoined { handle, peer_id } => match self.route(handle) {
                Route::Primary => self.on_peer_joined(handle, peer_id, &mut out),
                Route::Lobby => self.on_lobby_peer_joined(handle, peer_id, &mut out),
                Route::Stale => debug!(%handle, %peer_id, "join on released handle dropped"),
            },
            Event::PeerLeft { handle, peer_id } => match self.route(handle) {
                Route::Primary => self.on_peer_left(peer_id, &mut out),
                Route::Lobby => debug!(%peer_id, "seeker left the lobby"),
                Route::Stale => debug!(%handle, %peer_id, "leave on released handle dropped"),
            },
            Event::Received {
                handle,
                channel,
                from,
                data,
            } => match self.route(handle) {
                Route::Primary => self.on_room_frame(channel, from, &data, &mut out),
                Route::Lobby => self.on_lobby_frame(handle, channel, from, &data, &mut out),
                Route::Stale => debug!(%handle, %channel, "frame on released handle dropped"),
            },
        }
        out
    }

    // ------------------------------------------------------------------------
    // Session Manager
    // ------------------------------------------------------------------------

    fn create_as_host(
        &mut self,
        room_id: Option<RoomId>,
        password: Option<RoomPassword>,
        out: &mut Outcome,
    ) {
        let room_id = room_id.unwrap_or_else(|| self.fresh_room_id());
        self.bind(RoomTarget { room_id, password }, SessionRole::Host, out);
    }

    /// Replace the session wholesale: release the old handle, open the new one
    fn bind(&mut self, target: RoomTarget, role: SessionRole, out: &mut Outcome) {
        self.release_primary(out);

        let handle = self.allocate_handle();
        out.effect(Effect::OpenRoom {
            handle,
            role: HandleRole::Primary,
            room_id: target.room_id.clone(),
            config: self.config.room_config(target.password.clone()),
        });

        let notice = match role {
            SessionRole::Host => format!("You created room \"{}\". You are the host.", target.room_id),
            SessionRole::Guest => format!("You joined room \"{}\".", target.room_id),
        };
        info!(room = %target.room_id, ?role, %handle, "bound to room");

        self.session = Some(Session::new(
            &self.self_id,
            target,
            role,
            handle,
            self.config.provisional_name_len,
        ));
        out.app(AppEvent::TranscriptCleared);
        self.emit_session_changed(out);
        self.notice(notice, out);
    }

    fn release_primary(&mut self, out: &mut Outcome) {
        if let Some(handle) = self.session.as_mut().and_then(|s| s.handle.take()) {
            debug!(%handle, "releasing primary room");
            out.effect(Effect::ReleaseRoom { handle });
        }
    }

    /// Tell everyone the room is going away, if we are its host
    fn announce_close(&self, out: &mut Outcome) {
        if let Some(session) = &self.session {
            if let (true, Some(handle)) = (session.is_host(), session.handle) {
                push_send(out, handle, &ControlSignal::RoomClose, None);
            }
        }
    }

    fn leave(&mut self, out: &mut Outcome) {
        self.eviction.cancel(out);
        self.announce_close(out);
        self.create_as_host(None, None, out);
    }

    fn join_room(&mut self, target: RoomTarget, out: &mut Outcome) {
        self.eviction.cancel(out);
        self.announce_close(out);
        self.bind(target, SessionRole::Guest, out);
    }

    /// Destructive rekey: evict everyone and reopen the same room id
    fn set_password(&mut self, password: Option<RoomPassword>, out: &mut Outcome) {
        let room_id = match &self.session {
            Some(session) if session.is_host() => session.room_id.clone(),
            Some(_) => {
                debug!("only the host can change the password; ignoring");
                return;
            }
            None => {
                warn!("not bound to a room; ignoring password change");
                return;
            }
        };
        self.eviction.cancel(out);
        self.announce_close(out);
        info!(room = %room_id, "recreating room under a new password");
        self.create_as_host(Some(room_id), password, out);
    }

    fn shutdown(&mut self, out: &mut Outcome) {
        self.eviction.cancel(out);
        self.pairing.cancel(out);
        self.end_matchmaking(out);
        self.release_primary(out);
        self.emit_session_changed(out);
    }

    fn fresh_room_id(&mut self) -> RoomId {
        match &self.session {
            Some(session) => RoomId::generate_distinct(&mut self.rng, &session.room_id),
            None => RoomId::generate(&mut self.rng),
        }
    }

    fn allocate_handle(&mut self) -> HandleId {
        let handle = self.next_handle;
        self.next_handle = handle.next();
        handle
    }

    fn allocate_timer(&mut self) -> TimerId {
        let timer = self.next_timer;
        self.next_timer = timer.next();
        timer
    }

    fn route(&self, handle: HandleId) -> Route {
        if self.session.as_ref().and_then(|s| s.handle) == Some(handle) {
            Route::Primary
        } else if self.matchmaker.lobby_handle() == Some(handle) {
            Route::Lobby
        } else {
            Route::Stale
        }
    }

    fn emit_session_changed(&self, out: &mut Outcome) {
        if let Some(snapshot) = self.snapshot() {
            out.app(AppEvent::SessionChanged(snapshot));
        }
    }

    fn notice(&mut self, content: impl Into<String>, out: &mut Outcome) {
        let now = self.time_source.now();
        if let Some(session) = self.session.as_mut() {
            record_notice(session, content, now, out);
        }
    }

    // ------------------------------------------------------------------------
    // Presence Tracker
    // ------------------------------------------------------------------------

    fn on_peer_joined(&mut self, handle: HandleId, peer: PeerId, out: &mut Outcome) {
        let now = self.time_source.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        push_send(
            out,
            handle,
            &ProfilePayload {
                name: self.display_name.clone(),
            },
            Some(peer.clone()),
        );
        if session.is_host() {
            push_send(
                out,
                handle,
                &ControlSignal::HostAnnounce {
                    host_id: self.self_id.clone(),
                },
                Some(peer.clone()),
            );
        }

        info!(%peer, "peer joined");
        if session.presence.observe_join(&peer) {
            out.app(presence_changed(session));
        }
        record_notice(session, PEER_CONNECTED_NOTICE, now, out);
    }

    fn on_peer_left(&mut self, peer: PeerId, out: &mut Outcome) {
        let now = self.time_source.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.presence.remove(&peer) {
            Some(record) => {
                info!(%peer, name = %record.name, "peer left");
                out.app(presence_changed(session));
                record_notice(session, format!("{} left the room.", record.name), now, out);
            }
            None => debug!(%peer, "leave for unknown peer ignored"),
        }
    }

    // ------------------------------------------------------------------------
    // Message Relay
    // ------------------------------------------------------------------------

    /// Optimistic echo, then fire-and-forget broadcast
    fn send_text(&mut self, content: String, out: &mut Outcome) {
        let now = self.time_source.now();
        let Some(session) = self.session.as_mut() else {
            warn!("not bound to a room; dropping message");
            return;
        };

        let (entry, payload) =
            transcript::compose_text(&self.self_id, &self.display_name, content, now);
        session.transcript.push(entry.clone());
        out.app(AppEvent::TranscriptAppended(entry));

        match session.handle {
            Some(handle) => push_send(out, handle, &payload, None),
            None => debug!("no open room handle; message kept locally only"),
        }
    }

    fn on_room_frame(&mut self, channel: ChannelName, from: PeerId, data: &[u8], out: &mut Outcome) {
        match channel {
            ChannelName::Message => match MessagePayload::decode(data) {
                Ok(payload) => {
                    if let Some(session) = self.session.as_mut() {
                        let entry = ChatEntry::received(payload, from);
                        session.transcript.push(entry.clone());
                        out.app(AppEvent::TranscriptAppended(entry));
                    }
                }
                Err(err) => drop_frame(channel, &from, &err),
            },
            ChannelName::Profile => match ProfilePayload::decode(data) {
                Ok(profile) => {
                    if let Some(session) = self.session.as_mut() {
                        if session.presence.apply_profile(&from, profile.name) {
                            out.app(presence_changed(session));
                        }
                    }
                }
                Err(err) => drop_frame(channel, &from, &err),
            },
            ChannelName::Control => match ControlSignal::decode(data) {
                Ok(signal) => self.on_control(signal, from, out),
                Err(err) => drop_frame(channel, &from, &err),
            },
            ChannelName::Matchmaking => {
                debug!(%from, "matchmaking frame on a primary room ignored");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Control Protocol Handler
    // ------------------------------------------------------------------------

    fn kick(&mut self, peer: PeerId, out: &mut Outcome) {
        let now = self.time_source.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_host() {
            debug!(%peer, "only the host can kick; ignoring");
            return;
        }

        // Broadcast: the target evicts itself, everyone else ignores it
        if let Some(handle) = session.handle {
            push_send(
                out,
                handle,
                &ControlSignal::Kick {
                    target_id: peer.clone(),
                },
                None,
            );
        }
        if let Some(record) = session.presence.remove(&peer) {
            info!(%peer, name = %record.name, "kicked peer");
            out.app(presence_changed(session));
            record_notice(session, format!("{} was kicked.", record.name), now, out);
        }
    }

    fn on_control(&mut self, signal: ControlSignal, from: PeerId, out: &mut Outcome) {
        match control::interpret(&signal, &self.self_id) {
            ControlOutcome::HostAnnounced(host_id) => {
                if let Some(session) = self.session.as_mut() {
                    debug!(%from, %host_id, "host announced");
                    session.host_id = Some(host_id.clone());
                    out.app(AppEvent::HostChanged {
                        host_id: Some(host_id),
                    });
                }
            }
            ControlOutcome::Evict(reason) => {
                info!(%from, ?reason, "evicted from room");
                self.self_evict(reason, out);
            }
            ControlOutcome::Ignore => debug!(%from, ?signal, "control signal not for us"),
        }
    }

    /// Release now, host a fresh room after the grace period
    fn self_evict(&mut self, reason: EvictReason, out: &mut Outcome) {
        let now = self.time_source.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        record_notice(session, reason.notice(), now, out);
        if let Some(handle) = session.handle.take() {
            out.effect(Effect::ReleaseRoom { handle });
        }
        let room_id = RoomId::generate_distinct(&mut self.rng, &session.room_id);

        self.emit_session_changed(out);
        let timer = self.allocate_timer();
        self.eviction.schedule(
            timer,
            DeferredAction::RecreateAfterEviction { room_id },
            self.config.eviction_delay(),
            out,
        );
    }

    fn on_timer(&mut self, timer: TimerId, out: &mut Outcome) {
        let Some(action) = self.eviction.fire(timer).or_else(|| self.pairing.fire(timer)) else {
            debug!(%timer, "stale timer ignored");
            return;
        };
        match action {
            DeferredAction::RecreateAfterEviction { room_id } => {
                self.create_as_host(Some(room_id), None, out);
                self.notice(REHOSTED_NOTICE, out);
            }
            DeferredAction::CompletePairing { offer, as_host } => {
                // The paired room replaces any recreate still waiting
                self.eviction.cancel(out);
                self.end_matchmaking(out);
                let role = if as_host {
                    SessionRole::Host
                } else {
                    SessionRole::Guest
                };
                info!(room = %offer.room_id, ?role, "moving to paired room");
                self.bind(RoomTarget::from(offer), role, out);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Matchmaking Coordinator
    // ------------------------------------------------------------------------

    fn connect_random(&mut self, out: &mut Outcome) {
        if self.matchmaker.is_active() {
            debug!("already matchmaking");
            return;
        }
        let handle = self.allocate_handle();
        out.effect(Effect::OpenRoom {
            handle,
            role: HandleRole::Lobby,
            room_id: self.lobby_room.clone(),
            config: self.config.lobby_config(),
        });
        self.matchmaker.begin(handle);
        info!(%handle, "entered matchmaking lobby");
        out.app(AppEvent::MatchmakingChanged { active: true });
    }

    /// Safe at any time; also abandons a pairing that has not completed yet.
    /// A recreate pending on the primary room is left alone.
    fn cancel_matchmaking(&mut self, out: &mut Outcome) {
        self.pairing.cancel(out);
        self.end_matchmaking(out);
    }

    fn end_matchmaking(&mut self, out: &mut Outcome) {
        if let Some(handle) = self.matchmaker.end() {
            debug!(%handle, "leaving matchmaking lobby");
            out.effect(Effect::ReleaseRoom { handle });
            out.app(AppEvent::MatchmakingChanged { active: false });
        }
    }

    fn on_lobby_peer_joined(&mut self, handle: HandleId, peer: PeerId, out: &mut Outcome) {
        if !matchmaking::is_initiator(&self.self_id, &peer) {
            debug!(%peer, "waiting for the other seeker's offer");
            return;
        }
        let offer = matchmaking::create_offer(&mut self.rng);
        info!(%peer, room = %offer.room_id, "offering private room");
        push_send(out, handle, &MatchmakingPayload::offer(&offer), Some(peer));
        let timer = self.allocate_timer();
        self.pairing.schedule(
            timer,
            DeferredAction::CompletePairing {
                offer,
                as_host: true,
            },
            self.config.pairing_delay(),
            out,
        );
    }

    fn on_lobby_frame(
        &mut self,
        handle: HandleId,
        channel: ChannelName,
        from: PeerId,
        data: &[u8],
        out: &mut Outcome,
    ) {
        if channel != ChannelName::Matchmaking {
            debug!(%handle, %channel, "non-matchmaking frame in lobby ignored");
            return;
        }
        match MatchmakingPayload::decode(data) {
            Ok(payload) => match payload.into_offer() {
                Some(offer) => {
                    info!(%from, room = %offer.room_id, "received pairing offer");
                    let timer = self.allocate_timer();
                    self.pairing.schedule(
                        timer,
                        DeferredAction::CompletePairing {
                            offer,
                            as_host: false,
                        },
                        self.config.pairing_delay(),
                        out,
                    );
                }
                None => debug!(%from, "matchmaking payload without an offer ignored"),
            },
            Err(err) => drop_frame(channel, &from, &err),
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn push_send<P: WirePayload>(
    out: &mut Outcome,
    handle: HandleId,
    payload: &P,
    target: Option<PeerId>,
) {
    match payload.encode() {
        Ok(data) => out.effect(Effect::Send {
            handle,
            channel: P::CHANNEL,
            data,
            target,
        }),
        Err(err) => warn!(channel = %P::CHANNEL, error = %err, "failed to encode payload"),
    }
}

fn record_notice(
    session: &mut Session,
    content: impl Into<String>,
    now: Timestamp,
    out: &mut Outcome,
) {
    let entry = ChatEntry::system(content, now);
    session.transcript.push(entry.clone());
    out.app(AppEvent::TranscriptAppended(entry));
}

fn presence_changed(session: &Session) -> AppEvent {
    AppEvent::PresenceChanged {
        peers: session.presence.peers().to_vec(),
    }
}

fn drop_frame(channel: ChannelName, from: &PeerId, err: &MeshroomError) {
    warn!(%channel, %from, error = %err, "dropping undecodable frame");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EntryKind;
    use crate::session::SenderId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Debug, Clone, Copy)]
    struct FixedTime(u64);

    impl TimeSource for FixedTime {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0)
        }
    }

    type TestCoordinator = RoomCoordinator<FixedTime, ChaCha8Rng>;

    fn coordinator(id: &str, name: &str) -> TestCoordinator {
        RoomCoordinator::new(
            PeerId::new(id),
            name,
            CoordinatorConfig::testing(),
            FixedTime(1_000),
            ChaCha8Rng::seed_from_u64(3),
        )
        .unwrap()
    }

    fn hosting(id: &str, name: &str) -> (TestCoordinator, HandleId) {
        let mut c = coordinator(id, name);
        c.start(None);
        let handle = c.session().unwrap().handle().unwrap();
        (c, handle)
    }

    fn guest_in(room: &str) -> (TestCoordinator, HandleId) {
        let mut c = coordinator("guest-peer-id", "Guest");
        c.start(Some(RoomTarget {
            room_id: room.parse().unwrap(),
            password: None,
        }));
        let handle = c.session().unwrap().handle().unwrap();
        (c, handle)
    }

    fn frame<P: WirePayload>(handle: HandleId, from: &str, payload: &P) -> Event {
        Event::Received {
            handle,
            channel: P::CHANNEL,
            from: PeerId::new(from),
            data: payload.encode().unwrap(),
        }
    }

    fn last_notice(c: &TestCoordinator) -> String {
        c.session()
            .unwrap()
            .transcript()
            .last()
            .map(|e| e.content.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_start_hosts_generated_room() {
        let mut c = coordinator("host-id", "Alice");
        let out = c.start(None);

        let session = c.session().unwrap();
        assert!(session.is_host());
        assert_eq!(session.host_id(), Some(&PeerId::new("host-id")));
        assert_eq!(session.room_id().as_str().len(), 8);
        assert!(matches!(
            out.effects.as_slice(),
            [Effect::OpenRoom { role: HandleRole::Primary, .. }]
        ));
        assert!(matches!(out.app_events[0], AppEvent::TranscriptCleared));
        assert_eq!(
            last_notice(&c),
            format!("You created room \"{}\". You are the host.", session.room_id())
        );

        // A second start is ignored
        assert!(c.start(None).is_empty());
    }

    #[test]
    fn test_start_with_target_joins_as_guest() {
        let (c, _) = guest_in("abc12345");
        let session = c.session().unwrap();
        assert!(!session.is_host());
        assert_eq!(session.host_id(), None);
        assert_eq!(last_notice(&c), "You joined room \"abc12345\".");
    }

    #[test]
    fn test_host_greets_joining_peer() {
        let (mut c, handle) = hosting("host-id", "Alice");
        let out = c.handle_event(Event::PeerJoined {
            handle,
            peer_id: PeerId::new("0123456789abcdef"),
        });

        let targeted: Vec<_> = out
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send {
                    channel, target, ..
                } => Some((*channel, target.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            targeted,
            vec![
                (ChannelName::Profile, Some(PeerId::new("0123456789abcdef"))),
                (ChannelName::Control, Some(PeerId::new("0123456789abcdef"))),
            ]
        );

        let peers = c.session().unwrap().presence().peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].name, "01234567");
        assert_eq!(last_notice(&c), PEER_CONNECTED_NOTICE);
    }

    #[test]
    fn test_guest_does_not_announce_itself_as_host() {
        let (mut c, handle) = guest_in("abc12345");
        let out = c.handle_event(Event::PeerJoined {
            handle,
            peer_id: PeerId::new("other"),
        });
        assert!(!out
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Send { channel: ChannelName::Control, .. })));
    }

    #[test]
    fn test_profile_before_join_converges() {
        let (mut c, handle) = hosting("host-id", "Alice");
        c.handle_event(frame(
            handle,
            "peer-b",
            &ProfilePayload {
                name: "Bob".to_string(),
            },
        ));
        c.handle_event(Event::PeerJoined {
            handle,
            peer_id: PeerId::new("peer-b"),
        });

        let presence = c.session().unwrap().presence();
        assert_eq!(presence.len(), 1);
        assert_eq!(presence.get(&PeerId::new("peer-b")).unwrap().name, "Bob");
    }

    #[test]
    fn test_leave_of_unknown_peer_is_silent() {
        let (mut c, handle) = hosting("host-id", "Alice");
        let before = c.session().unwrap().transcript().len();
        let out = c.handle_event(Event::PeerLeft {
            handle,
            peer_id: PeerId::new("stranger"),
        });
        assert!(out.is_empty());
        assert_eq!(c.session().unwrap().transcript().len(), before);
    }

    #[test]
    fn test_leave_uses_display_name() {
        let (mut c, handle) = hosting("host-id", "Alice");
        c.handle_event(Event::PeerJoined {
            handle,
            peer_id: PeerId::new("peer-b"),
        });
        c.handle_event(frame(
            handle,
            "peer-b",
            &ProfilePayload {
                name: "Bob".to_string(),
            },
        ));
        c.handle_event(Event::PeerLeft {
            handle,
            peer_id: PeerId::new("peer-b"),
        });
        assert!(c.session().unwrap().presence().is_empty());
        assert_eq!(last_notice(&c), "Bob left the room.");
    }

    #[test]
    fn test_events_on_stale_handle_are_dropped() {
        let (mut c, old) = hosting("host-id", "Alice");
        c.handle_command(Command::LeaveRoom);
        assert_ne!(c.session().unwrap().handle(), Some(old));

        let out = c.handle_event(Event::PeerJoined {
            handle: old,
            peer_id: PeerId::new("late"),
        });
        assert!(out.is_empty());
        assert!(c.session().unwrap().presence().is_empty());
    }

    #[test]
    fn test_events_about_self_are_ignored() {
        let (mut c, handle) = hosting("host-id", "Alice");
        let out = c.handle_event(Event::PeerJoined {
            handle,
            peer_id: PeerId::new("host-id"),
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_received_text_keeps_sender_attribution() {
        let (mut c, handle) = hosting("host-id", "Alice");
        let (_, payload) =
            transcript::compose_text(&PeerId::new("peer-b"), "Bob", "hi".into(), Timestamp::new(5));
        c.handle_event(frame(handle, "peer-b", &payload));

        let entry = c.session().unwrap().transcript().last().unwrap().clone();
        assert_eq!(entry.id, payload.id);
        assert_eq!(entry.sender_name, "Bob");
        assert_eq!(entry.kind, EntryKind::Text);
        assert_eq!(entry.timestamp, Timestamp::new(5));
    }

    #[test]
    fn test_undecodable_frame_is_dropped() {
        let (mut c, handle) = hosting("host-id", "Alice");
        let before = c.session().unwrap().transcript().len();
        let out = c.handle_event(Event::Received {
            handle,
            channel: ChannelName::Message,
            from: PeerId::new("peer-b"),
            data: b"not json".to_vec(),
        });
        assert!(out.is_empty());
        assert_eq!(c.session().unwrap().transcript().len(), before);
    }

    #[test]
    fn test_send_text_echoes_locally_and_broadcasts() {
        let (mut c, _) = hosting("host-id", "Alice");
        let out = c.handle_command(Command::SendText {
            content: "hello".to_string(),
        });

        let entry = c.session().unwrap().transcript().last().unwrap();
        assert_eq!(entry.content, "hello");
        assert_eq!(entry.sender_id, SenderId::Peer(PeerId::new("host-id")));
        assert!(matches!(
            out.effects.as_slice(),
            [Effect::Send { channel: ChannelName::Message, target: None, .. }]
        ));
    }

    #[test]
    fn test_kick_by_guest_is_ignored() {
        let (mut c, _) = guest_in("abc12345");
        let out = c.handle_command(Command::KickPeer {
            peer_id: PeerId::new("someone"),
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_set_password_by_guest_is_ignored() {
        let (mut c, _) = guest_in("abc12345");
        let out = c.handle_command(Command::SetPassword {
            password: RoomPassword::new("secret"),
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_room_close_evicts_then_rehosts() {
        let (mut c, handle) = guest_in("abc12345");
        let out = c.handle_event(frame(handle, "host", &ControlSignal::RoomClose));

        assert_eq!(last_notice(&c), "The host closed the room.");
        assert!(!c.session().unwrap().is_connected());
        let timer = out
            .effects
            .iter()
            .find_map(|e| match e {
                Effect::ScheduleTimer { timer, delay } => {
                    assert_eq!(*delay, c.config().eviction_delay());
                    Some(*timer)
                }
                _ => None,
            })
            .unwrap();
        assert!(matches!(
            out.effects.first(),
            Some(Effect::ReleaseRoom { handle: h }) if *h == handle
        ));

        c.handle_event(Event::TimerFired { timer });
        let session = c.session().unwrap();
        assert!(session.is_host());
        assert_ne!(session.room_id().as_str(), "abc12345");
        assert_eq!(last_notice(&c), REHOSTED_NOTICE);
    }

    #[test]
    fn test_user_action_cancels_pending_recreate() {
        let (mut c, handle) = guest_in("abc12345");
        let out = c.handle_event(frame(
            handle,
            "host",
            &ControlSignal::Kick {
                target_id: PeerId::new("guest-peer-id"),
            },
        ));
        let timer = out
            .effects
            .iter()
            .find_map(|e| match e {
                Effect::ScheduleTimer { timer, .. } => Some(*timer),
                _ => None,
            })
            .unwrap();

        let out = c.handle_command(Command::JoinRoom {
            room_id: "elsewhere".parse().unwrap(),
            password: None,
        });
        assert!(out
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CancelTimer { timer: t } if *t == timer)));
        assert!(c.pending_eviction().is_none());

        assert!(c.handle_event(Event::TimerFired { timer }).is_empty());
        assert_eq!(c.session().unwrap().room_id().as_str(), "elsewhere");
    }

    #[test]
    fn test_kick_for_someone_else_is_ignored() {
        let (mut c, handle) = guest_in("abc12345");
        let out = c.handle_event(frame(
            handle,
            "host",
            &ControlSignal::Kick {
                target_id: PeerId::new("third"),
            },
        ));
        assert!(out.is_empty());
        assert!(c.session().unwrap().is_connected());
    }

    #[test]
    fn test_host_announce_updates_host() {
        let (mut c, handle) = guest_in("abc12345");
        let out = c.handle_event(frame(
            handle,
            "host",
            &ControlSignal::HostAnnounce {
                host_id: PeerId::new("host"),
            },
        ));
        assert_eq!(c.session().unwrap().host_id(), Some(&PeerId::new("host")));
        assert!(matches!(
            out.app_events.as_slice(),
            [AppEvent::HostChanged { host_id: Some(_) }]
        ));
    }

    #[test]
    fn test_matchmaking_commands_are_idempotent() {
        let (mut c, _) = hosting("host-id", "Alice");
        assert!(!c.handle_command(Command::ConnectRandom).is_empty());
        assert!(c.is_matchmaking());
        assert!(c.handle_command(Command::ConnectRandom).is_empty());

        let lobby = c.lobby_handle().unwrap();
        let out = c.handle_command(Command::CancelMatchmaking);
        assert!(matches!(
            out.effects.as_slice(),
            [Effect::ReleaseRoom { handle }] if *handle == lobby
        ));
        assert!(c.handle_command(Command::CancelMatchmaking).is_empty());
        assert!(c.session().unwrap().is_connected());
    }

    #[test]
    fn test_lobby_frames_never_reach_primary_room() {
        let (mut c, handle) = hosting("bbb", "Bob");
        c.handle_command(Command::ConnectRandom);
        let lobby = c.lobby_handle().unwrap();

        let offer = MatchmakingPayload::offer(&matchmaking::create_offer(
            &mut ChaCha8Rng::seed_from_u64(9),
        ));
        // An offer on the primary handle is not a matchmaking offer
        c.handle_event(frame(handle, "aaa", &offer));
        assert!(c.pending_pairing().is_none());

        c.handle_event(frame(lobby, "aaa", &offer));
        assert!(matches!(
            c.pending_pairing(),
            Some(DeferredAction::CompletePairing { as_host: false, .. })
        ));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (mut c, handle) = hosting("host-id", "Alice");
        c.handle_command(Command::ConnectRandom);
        let lobby = c.lobby_handle().unwrap();

        let out = c.handle_command(Command::Shutdown);
        let released: Vec<_> = out
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::ReleaseRoom { handle } => Some(*handle),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec![lobby, handle]);
        assert!(!c.is_matchmaking());
        assert!(!c.session().unwrap().is_connected());
    }

    fn scheduled_timer(out: &Outcome) -> TimerId {
        out.effects
            .iter()
            .find_map(|e| match e {
                Effect::ScheduleTimer { timer, .. } => Some(*timer),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_room_close_during_pending_pairing_still_pairs() {
        let (mut c, handle) = guest_in("abc12345");
        c.handle_command(Command::ConnectRandom);
        let lobby = c.lobby_handle().unwrap();

        let offer = matchmaking::create_offer(&mut ChaCha8Rng::seed_from_u64(9));
        let out = c.handle_event(frame(lobby, "aaa", &MatchmakingPayload::offer(&offer)));
        let pairing = scheduled_timer(&out);

        let out = c.handle_event(frame(handle, "host", &ControlSignal::RoomClose));
        let eviction = scheduled_timer(&out);
        assert_ne!(pairing, eviction);
        assert!(!out
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CancelTimer { .. })));
        assert!(matches!(
            c.pending_pairing(),
            Some(DeferredAction::CompletePairing { as_host: false, .. })
        ));
        assert!(c.pending_eviction().is_some());
        assert!(c.is_matchmaking());

        let out = c.handle_event(Event::TimerFired { timer: pairing });
        assert!(out
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CancelTimer { timer } if *timer == eviction)));
        assert!(out
            .effects
            .iter()
            .any(|e| matches!(e, Effect::ReleaseRoom { handle } if *handle == lobby)));
        let session = c.session().unwrap();
        assert_eq!(session.room_id(), &offer.room_id);
        assert!(!session.is_host());
        assert!(session.is_connected());
        assert!(!c.is_matchmaking());
        assert!(c.pending_eviction().is_none());

        // The superseded recreate no longer does anything
        assert!(c.handle_event(Event::TimerFired { timer: eviction }).is_empty());
        assert_eq!(c.session().unwrap().room_id(), &offer.room_id);
    }

    #[test]
    fn test_cancel_after_eviction_and_offer_keeps_recreate() {
        let mut c = coordinator("aaa", "Alice");
        c.start(Some(RoomTarget {
            room_id: "abc12345".parse().unwrap(),
            password: None,
        }));
        let handle = c.session().unwrap().handle().unwrap();
        c.handle_command(Command::ConnectRandom);
        let lobby = c.lobby_handle().unwrap();

        let out = c.handle_event(frame(handle, "host", &ControlSignal::RoomClose));
        let eviction = scheduled_timer(&out);

        // We sort first, so we offer and wait out the settle delay
        c.handle_event(Event::PeerJoined {
            handle: lobby,
            peer_id: PeerId::new("bbb"),
        });
        assert!(matches!(
            c.pending_pairing(),
            Some(DeferredAction::CompletePairing { as_host: true, .. })
        ));
        assert!(c.pending_eviction().is_some());

        c.handle_command(Command::CancelMatchmaking);
        assert!(c.pending_pairing().is_none());
        assert!(!c.is_matchmaking());
        assert!(c.pending_eviction().is_some());

        c.handle_event(Event::TimerFired { timer: eviction });
        let session = c.session().unwrap();
        assert!(session.is_connected());
        assert!(session.is_host());
        assert_ne!(session.room_id().as_str(), "abc12345");
        assert_eq!(last_notice(&c), REHOSTED_NOTICE);
    }

    #[test]
    fn test_leave_during_pending_pairing_keeps_pairing() {
        let (mut c, _) = hosting("bbb", "Bob");
        c.handle_command(Command::ConnectRandom);
        let lobby = c.lobby_handle().unwrap();
        let offer = matchmaking::create_offer(&mut ChaCha8Rng::seed_from_u64(5));
        let pairing =
            scheduled_timer(&c.handle_event(frame(lobby, "aaa", &MatchmakingPayload::offer(&offer))));

        let out = c.handle_command(Command::LeaveRoom);
        assert!(!out
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CancelTimer { .. })));
        assert!(c.pending_pairing().is_some());

        c.handle_event(Event::TimerFired { timer: pairing });
        assert_eq!(c.session().unwrap().room_id(), &offer.room_id);
        assert!(!c.is_matchmaking());
    }
}
