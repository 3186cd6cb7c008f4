//! Session state machine.
//!
//! ```text
//!            start (client)              candidate matched
//!   Idle ──────────────────▶ Discovering ─────────────────▶ Joining
//!    │                          ▲   ▲                        │  ▲ │
//!    │ start (host)             │   └──── rejected (client) ─┘  │ │ joined
//!    └──────────────────────────┼───────────────────────────────┘ ▼
//!                               │          Rejected ◀─ rejected   Joined
//!                               │   (host, backoff) ─▶ Joining      │
//!                               │                                   │ ping unacknowledged
//!                               └── no join code ── Disconnected ◀──┘
//!                                                   └─▶ Joining (immediately)
//! ```
//!
//! The controller is driven from a single task: [`SessionController::tick`]
//! on every scheduling tick and [`SessionController::handle_event`] for each
//! collaborator notification. Both take the current monotonic time, so the
//! controller itself never reads a clock or blocks.

use crate::collaborators::{
    Collaborators, DirectoryClient, EventSink, RoomHandle, SessionEvent, Subscription,
    TimeoutBehaviour,
};
use crate::config::Config;
use crate::configurator::{PostJoinConfigurator, Trigger};
use crate::discovery::DiscoveryLoop;
use crate::errors::SessionError;
use crate::observability::metrics;
use crate::role::Role;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Base delay before a host retries room creation after a rejection.
pub const HOST_RETRY_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Maximum delay between host room creation retries.
pub const HOST_RETRY_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Discovering,
    Joining,
    Joined,
    Rejected,
    Disconnected,
}

impl SessionState {
    /// Returns the state as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Discovering => "discovering",
            SessionState::Joining => "joining",
            SessionState::Joined => "joined",
            SessionState::Rejected => "rejected",
            SessionState::Disconnected => "disconnected",
        }
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub peer_id: String,
    pub role: Role,
    pub state: SessionState,
    pub room_name: String,
    pub joined_room: Option<RoomHandle>,
    pub voice_enabled: bool,
    pub avatar_hidden: bool,
    pub tracked_connections: usize,
    pub generation: u64,
}

/// Host retry schedule after a rejected create.
#[derive(Debug)]
struct HostRetry {
    next_attempt_at: Option<Instant>,
    delay: Duration,
}

impl HostRetry {
    fn new() -> Self {
        Self {
            next_attempt_at: None,
            delay: HOST_RETRY_BACKOFF_BASE,
        }
    }

    /// Schedule the next attempt and double the delay, capped.
    fn schedule(&mut self, now: Instant) -> Duration {
        let delay = self.delay;
        self.next_attempt_at = Some(now + delay);
        self.delay = (self.delay * 2).min(HOST_RETRY_BACKOFF_MAX);
        delay
    }

    fn is_due(&self, now: Instant) -> bool {
        self.next_attempt_at.is_some_and(|at| now >= at)
    }

    fn reset(&mut self) {
        self.next_attempt_at = None;
        self.delay = HOST_RETRY_BACKOFF_BASE;
    }
}

/// The room session state machine.
///
/// Owns all session state. Collaborator notifications must be delivered on
/// the same task that calls [`Self::tick`]; the actor in
/// [`crate::actors`] takes care of that.
pub struct SessionController {
    peer_id: String,
    role: Role,
    state: SessionState,
    room_name: String,
    public: bool,
    joined_room: Option<RoomHandle>,
    last_join_code: Option<String>,
    join_started_at: Option<Instant>,
    join_timeout: Duration,
    last_ping_at: Option<Instant>,
    ping_interval: Duration,
    awaiting_ping_ack: bool,
    host_retry: HostRetry,
    discovery: DiscoveryLoop,
    configurator: PostJoinConfigurator,
    directory: Arc<dyn DirectoryClient>,
    subscriptions: Vec<Subscription>,
    generation: u64,
    torn_down: bool,
}

impl SessionController {
    /// Build a controller and subscribe `sink` to every supplied collaborator.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingCollaborator` if no directory client was
    /// supplied. Nothing is subscribed in that case.
    pub fn new(
        config: &Config,
        collaborators: Collaborators,
        sink: &EventSink,
    ) -> Result<Self, SessionError> {
        let Collaborators {
            directory,
            voice,
            avatars,
            spawner,
        } = collaborators;

        let directory = directory.ok_or_else(|| {
            error!(
                target: "room.session.controller",
                peer_id = %config.peer_id,
                "Directory client not supplied, session cannot start"
            );
            SessionError::MissingCollaborator("directory client")
        })?;

        let mut subscriptions = vec![Subscription::acquire("directory", &directory, sink)];
        if let Some(voice) = &voice {
            subscriptions.push(Subscription::acquire("voice", voice, sink));
        }
        if let Some(avatars) = &avatars {
            subscriptions.push(Subscription::acquire("avatars", avatars, sink));
        }

        directory.set_timeout_behaviour(TimeoutBehaviour::Reconnect);

        let role = config.role();
        info!(
            target: "room.session.controller",
            peer_id = %config.peer_id,
            role = %role,
            room_name = %config.room_name,
            "Running in {role} mode"
        );

        Ok(Self {
            peer_id: config.peer_id.clone(),
            role,
            state: SessionState::Idle,
            room_name: config.room_name.clone(),
            public: config.public,
            joined_room: None,
            last_join_code: None,
            join_started_at: None,
            join_timeout: config.join_timeout,
            last_ping_at: None,
            ping_interval: config.ping_interval,
            awaiting_ping_ack: false,
            host_retry: HostRetry::new(),
            discovery: DiscoveryLoop::new(config.room_name.clone(), config.discovery_interval),
            configurator: PostJoinConfigurator::new(
                role,
                config.voice_enabled,
                config.avatar_hidden,
                avatars,
                spawner,
            ),
            directory,
            subscriptions,
            generation: 0,
            torn_down: false,
        })
    }

    /// Leave `Idle`: hosts create the room, clients start discovering.
    pub fn start(&mut self, now: Instant) {
        if self.torn_down || self.state != SessionState::Idle {
            warn!(
                target: "room.session.controller",
                state = self.state.as_str(),
                "Session already started"
            );
            return;
        }

        self.configurator.configure_avatar_visibility();
        match self.role {
            Role::Host => self.issue_create(now),
            Role::Client => {
                self.set_state(SessionState::Discovering);
                self.discovery.tick(now, self.directory.as_ref());
            }
        }
    }

    /// Advance timers: discovery, join timeout, host retry and keepalive.
    pub fn tick(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }

        match self.state {
            SessionState::Discovering => {
                self.discovery.tick(now, self.directory.as_ref());
            }
            SessionState::Joining => {
                let timed_out = self
                    .join_started_at
                    .is_some_and(|at| now.saturating_duration_since(at) > self.join_timeout);
                if timed_out {
                    metrics::record_join_result("timeout");
                    self.handle_rejection("join timed out", now);
                }
            }
            SessionState::Rejected => {
                if self.host_retry.is_due(now) {
                    self.issue_create(now);
                }
            }
            SessionState::Joined => self.keepalive(now),
            SessionState::Idle | SessionState::Disconnected => {}
        }
    }

    /// Consume one collaborator notification.
    pub fn handle_event(&mut self, event: SessionEvent, now: Instant) {
        if self.torn_down {
            debug!(
                target: "room.session.controller",
                event = event.kind(),
                generation = self.generation,
                "Ignoring notification for torn down session"
            );
            return;
        }

        match event {
            SessionEvent::RoomsDiscovered(rooms) => {
                if self.role != Role::Client || self.state != SessionState::Discovering {
                    debug!(
                        target: "room.session.controller",
                        state = self.state.as_str(),
                        "Ignoring discovery response outside discovery"
                    );
                    return;
                }
                debug!(
                    target: "room.session.discovery",
                    rooms = rooms.len(),
                    "Discovered rooms"
                );
                let join_code = self
                    .discovery
                    .match_candidate(&rooms)
                    .map(|room| room.join_code.clone());
                match join_code {
                    Some(join_code) => {
                        info!(
                            target: "room.session.discovery",
                            room_name = %self.room_name,
                            "Found room, attempting to join"
                        );
                        self.issue_join(join_code, now);
                    }
                    None => {
                        debug!(
                            target: "room.session.discovery",
                            room_name = %self.room_name,
                            "Room not found, will retry"
                        );
                    }
                }
            }

            SessionEvent::Joined(room) => self.on_joined(room, now),

            SessionEvent::JoinRejected(rejection) => {
                if self.state != SessionState::Joining {
                    debug!(
                        target: "room.session.controller",
                        state = self.state.as_str(),
                        reason = %rejection.reason,
                        "Ignoring stale join rejection"
                    );
                    return;
                }
                metrics::record_join_result("rejected");
                self.handle_rejection(&rejection.reason, now);
            }

            SessionEvent::RoomUpdated(room) => {
                if self.state != SessionState::Joined {
                    return;
                }
                let current = self.joined_room.clone();
                self.configurator.apply(Trigger::Update {
                    room: &room,
                    current: current.as_ref(),
                });
                if current.as_ref() == Some(&room) {
                    debug!(
                        target: "room.session.controller",
                        room_name = %room.name,
                        "Room updated"
                    );
                    self.joined_room = Some(room);
                }
            }

            SessionEvent::PingAcknowledged => {
                if self.state == SessionState::Joined {
                    self.awaiting_ping_ack = false;
                }
            }

            SessionEvent::PeerConnectionCreated(connection) => {
                self.configurator.apply(Trigger::PeerConnection(connection));
            }

            SessionEvent::AvatarCreated(avatar) => {
                self.configurator.apply(Trigger::AvatarCreated(avatar));
            }
        }
    }

    /// Force a host room creation when not joined.
    ///
    /// Returns `false` for clients and when already joined.
    pub fn create_room(&mut self, now: Instant) -> bool {
        if self.torn_down || self.role != Role::Host || self.state == SessionState::Joined {
            return false;
        }
        self.issue_create(now);
        true
    }

    /// Flip host avatar visibility. `None` for clients.
    pub fn toggle_host_avatar(&mut self) -> Option<bool> {
        self.configurator.toggle_host_avatar()
    }

    /// Change the voice policy; applies to every tracked connection.
    pub fn set_voice_enabled(&mut self, enabled: bool) {
        self.configurator.set_voice_enabled(enabled);
    }

    /// Release every subscription. Later notifications and ticks are ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.generation += 1;
        self.subscriptions.clear();
        if self.joined_room.take().is_some() {
            metrics::set_session_joined(false);
        }
        self.set_state(SessionState::Idle);
        info!(
            target: "room.session.controller",
            peer_id = %self.peer_id,
            generation = self.generation,
            "Session torn down"
        );
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            peer_id: self.peer_id.clone(),
            role: self.role,
            state: self.state,
            room_name: self.room_name.clone(),
            joined_room: self.joined_room.clone(),
            voice_enabled: self.configurator.voice_enabled(),
            avatar_hidden: self.configurator.avatar_hidden(),
            tracked_connections: self.configurator.tracked_connections(),
            generation: self.generation,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn joined_room(&self) -> Option<&RoomHandle> {
        self.joined_room.as_ref()
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn issue_create(&mut self, now: Instant) {
        self.set_state(SessionState::Joining);
        self.join_started_at = Some(now);
        self.host_retry.next_attempt_at = None;
        info!(
            target: "room.session.controller",
            room_name = %self.room_name,
            public = self.public,
            "Creating room"
        );
        self.directory.create_and_join(&self.room_name, self.public);
        metrics::record_join_attempt("create");
    }

    fn issue_join(&mut self, join_code: String, now: Instant) {
        self.set_state(SessionState::Joining);
        self.join_started_at = Some(now);
        self.directory.join_by_code(&join_code);
        self.last_join_code = Some(join_code);
        metrics::record_join_attempt("code");
    }

    fn on_joined(&mut self, room: RoomHandle, now: Instant) {
        info!(
            target: "room.session.controller",
            room_id = %room.id,
            room_name = %room.name,
            previous_state = self.state.as_str(),
            "Successfully joined room"
        );
        metrics::record_join_result("joined");

        self.joined_room = Some(room);
        self.join_started_at = None;
        self.last_ping_at = Some(now);
        self.awaiting_ping_ack = false;
        self.host_retry.reset();
        self.set_state(SessionState::Joined);
        metrics::set_session_joined(true);

        self.configurator.apply(Trigger::Join);
    }

    fn handle_rejection(&mut self, reason: &str, now: Instant) {
        self.join_started_at = None;
        match self.role {
            Role::Client => {
                warn!(
                    target: "room.session.controller",
                    reason = %reason,
                    "Join rejected, resuming discovery"
                );
                self.set_state(SessionState::Discovering);
                self.discovery.defer(now);
            }
            Role::Host => {
                let delay = self.host_retry.schedule(now);
                warn!(
                    target: "room.session.controller",
                    reason = %reason,
                    retry_in_ms = delay.as_millis(),
                    "Room creation rejected, retrying after backoff"
                );
                self.set_state(SessionState::Rejected);
            }
        }
    }

    fn keepalive(&mut self, now: Instant) {
        let due = self
            .last_ping_at
            .map_or(true, |at| now.saturating_duration_since(at) > self.ping_interval);
        if !due {
            return;
        }

        if self.awaiting_ping_ack {
            self.disconnect(now);
            return;
        }

        self.last_ping_at = Some(now);
        self.awaiting_ping_ack = true;
        self.directory.ping();
        metrics::record_ping();
    }

    fn disconnect(&mut self, now: Instant) {
        warn!(
            target: "room.session.controller",
            room_name = %self.room_name,
            role = %self.role,
            "Ping not acknowledged, session disconnected"
        );
        metrics::record_disconnect(self.role.as_str());
        metrics::set_session_joined(false);

        self.joined_room = None;
        self.awaiting_ping_ack = false;
        self.last_ping_at = None;
        self.set_state(SessionState::Disconnected);

        match self.role {
            Role::Host => self.issue_create(now),
            Role::Client => match self.last_join_code.clone() {
                Some(join_code) => {
                    info!(
                        target: "room.session.controller",
                        "Rejoining last known room"
                    );
                    self.issue_join(join_code, now);
                }
                None => {
                    info!(
                        target: "room.session.controller",
                        "No join code known, rediscovering"
                    );
                    self.set_state(SessionState::Discovering);
                    self.discovery.tick(now, self.directory.as_ref());
                }
            },
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        debug!(
            target: "room.session.controller",
            from = self.state.as_str(),
            to = next.as_str(),
            "State transition"
        );
        self.state = next;
        metrics::record_state_transition(next.as_str());
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("peer_id", &self.peer_id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("room_name", &self.room_name)
            .field("joined_room", &self.joined_room)
            .field("subscriptions", &self.subscriptions.len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_host_retry_backoff_doubles_and_caps() {
        let mut retry = HostRetry::new();
        let t0 = Instant::now();

        let delays: Vec<u64> = (0..7).map(|_| retry.schedule(t0).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        retry.reset();
        assert_eq!(retry.schedule(t0), HOST_RETRY_BACKOFF_BASE);
    }

    #[test]
    fn test_host_retry_due_only_after_delay() {
        let mut retry = HostRetry::new();
        let t0 = Instant::now();
        assert!(!retry.is_due(t0));

        retry.schedule(t0);
        assert!(!retry.is_due(t0 + Duration::from_millis(999)));
        assert!(retry.is_due(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(SessionState::Discovering.as_str(), "discovering");
        assert_eq!(SessionState::Disconnected.as_str(), "disconnected");
    }
}
