//! Collaborator contracts consumed by the session core.
//!
//! The directory client, voice relay, avatar service and spawn subsystem are
//! external. The core only issues fire-and-forget calls on them and receives
//! their results later as [`SessionEvent`] notifications pushed into an
//! [`EventSink`].
//!
//! Notification sources are subscribed through [`Subscription`] guards, which
//! unsubscribe on drop. Tearing a session down therefore releases every
//! registration regardless of the exit path.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Room as reported by the directory on join and update.
///
/// Two handles are the same room when their `id`s match; name and join code
/// are informational.
#[derive(Debug, Clone, Eq, Serialize)]
pub struct RoomHandle {
    pub id: String,
    pub name: String,
    pub join_code: String,
}

impl RoomHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, join_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            join_code: join_code.into(),
        }
    }
}

impl PartialEq for RoomHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Entry of a discovery response. Never retained past the cycle that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCandidate {
    pub name: String,
    pub join_code: String,
}

impl RoomCandidate {
    pub fn new(name: impl Into<String>, join_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            join_code: join_code.into(),
        }
    }
}

/// Reason the directory refused a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// What the transport does when the directory stops answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutBehaviour {
    /// Drop the room.
    Leave,
    /// Keep the room and try to reconnect.
    Reconnect,
}

/// Identifies a voice relay peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Identifies an avatar instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvatarId(pub u64);

/// Avatar creation policy of the avatar service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarPolicy {
    Enabled,
    Disabled,
}

/// Avatar reported by [`SessionEvent::AvatarCreated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarInfo {
    pub id: AvatarId,
    pub is_local: bool,
}

/// Registration handle returned by [`NotificationSource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Asynchronous notification from a collaborator.
#[derive(Debug)]
pub enum SessionEvent {
    /// Response to [`DirectoryClient::discover_rooms`].
    RoomsDiscovered(Vec<RoomCandidate>),
    /// A create-and-join or join-by-code succeeded.
    Joined(RoomHandle),
    /// A create-and-join or join-by-code was refused.
    JoinRejected(Rejection),
    /// Properties of a room changed.
    RoomUpdated(RoomHandle),
    /// The directory acknowledged the last [`DirectoryClient::ping`].
    PingAcknowledged,
    /// The voice relay created a peer connection.
    PeerConnectionCreated(Arc<dyn PeerConnection>),
    /// The avatar service created an avatar.
    AvatarCreated(AvatarInfo),
}

impl SessionEvent {
    /// Returns the event kind for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            SessionEvent::RoomsDiscovered(_) => "rooms_discovered",
            SessionEvent::Joined(_) => "joined",
            SessionEvent::JoinRejected(_) => "join_rejected",
            SessionEvent::RoomUpdated(_) => "room_updated",
            SessionEvent::PingAcknowledged => "ping_acknowledged",
            SessionEvent::PeerConnectionCreated(_) => "peer_connection_created",
            SessionEvent::AvatarCreated(_) => "avatar_created",
        }
    }
}

/// Single-producer queue that marshals collaborator callbacks onto the
/// session task.
///
/// Cheap to clone; emitting never blocks, so it is safe to call from any
/// thread or from inside a collaborator method.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the session task drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Push a notification. Returns `false` once the session is gone.
    pub fn emit(&self, event: SessionEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Anything that delivers notifications into an [`EventSink`].
pub trait NotificationSource: Send + Sync {
    /// Register `sink`; notifications flow until [`Self::unsubscribe`].
    fn subscribe(&self, sink: EventSink) -> SubscriptionId;

    /// Remove a registration. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Room directory / messaging service.
///
/// Every call is fire-and-forget; outcomes arrive as [`SessionEvent`]s.
pub trait DirectoryClient: NotificationSource {
    /// Create `room_name` and join it. Fires `Joined` or `JoinRejected`.
    fn create_and_join(&self, room_name: &str, public: bool);

    /// Query advertised rooms. Fires `RoomsDiscovered`.
    fn discover_rooms(&self);

    /// Join an existing room. Fires `Joined` or `JoinRejected`.
    fn join_by_code(&self, join_code: &str);

    /// Keepalive. Fires `PingAcknowledged` when the directory answers.
    fn ping(&self);

    /// Transport-level policy when the directory times out.
    fn set_timeout_behaviour(&self, behaviour: TimeoutBehaviour);
}

/// Voice relay peer connection.
pub trait PeerConnection: Send + Sync + fmt::Debug {
    fn id(&self) -> ConnectionId;

    fn set_active(&self, active: bool);
}

/// Voice relay. Fires `PeerConnectionCreated`.
pub trait VoiceRelay: NotificationSource {}

/// Avatar service. Fires `AvatarCreated`.
pub trait AvatarService: NotificationSource {
    fn creation_policy(&self) -> AvatarPolicy;

    fn set_creation_policy(&self, policy: AvatarPolicy);

    /// Avatars owned by this process that currently exist.
    fn local_avatars(&self) -> Vec<AvatarId>;

    /// Force an avatar instance inactive.
    fn deactivate(&self, avatar: AvatarId);
}

/// Networked object spawning.
pub trait SpawnSubsystem: Send + Sync {
    fn set_enabled(&self, enabled: bool);
}

/// Collaborators injected into the session at construction.
///
/// Only the directory client is required.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub directory: Option<Arc<dyn DirectoryClient>>,
    pub voice: Option<Arc<dyn VoiceRelay>>,
    pub avatars: Option<Arc<dyn AvatarService>>,
    pub spawner: Option<Arc<dyn SpawnSubsystem>>,
}

impl Collaborators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryClient>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_voice(mut self, voice: Arc<dyn VoiceRelay>) -> Self {
        self.voice = Some(voice);
        self
    }

    #[must_use]
    pub fn with_avatars(mut self, avatars: Arc<dyn AvatarService>) -> Self {
        self.avatars = Some(avatars);
        self
    }

    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn SpawnSubsystem>) -> Self {
        self.spawner = Some(spawner);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("directory", &self.directory.is_some())
            .field("voice", &self.voice.is_some())
            .field("avatars", &self.avatars.is_some())
            .field("spawner", &self.spawner.is_some())
            .finish()
    }
}

/// Scoped notification registration. Unsubscribes when dropped.
pub struct Subscription {
    source: &'static str,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Subscribe `sink` to `source` for the lifetime of the returned guard.
    pub fn acquire<S>(source_name: &'static str, source: &Arc<S>, sink: &EventSink) -> Self
    where
        S: NotificationSource + ?Sized + 'static,
    {
        let id = source.subscribe(sink.clone());
        let source = Arc::clone(source);
        debug!(
            target: "room.session.subscription",
            source = source_name,
            subscription_id = id.0,
            "Subscribed to notifications"
        );
        Self {
            source: source_name,
            release: Some(Box::new(move || source.unsubscribe(id))),
        }
    }

    /// Name of the collaborator this registration belongs to.
    #[must_use]
    pub fn source(&self) -> &'static str {
        self.source
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!(
                target: "room.session.subscription",
                source = self.source,
                "Released notification subscription"
            );
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("source", &self.source)
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSource {
        next_id: AtomicU64,
        active: Mutex<Vec<SubscriptionId>>,
    }

    impl NotificationSource for CountingSource {
        fn subscribe(&self, _sink: EventSink) -> SubscriptionId {
            let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.active.lock().unwrap().push(id);
            id
        }

        fn unsubscribe(&self, id: SubscriptionId) {
            self.active.lock().unwrap().retain(|s| *s != id);
        }
    }

    #[test]
    fn test_room_handle_equality_is_by_id() {
        let a = RoomHandle::new("room-1", "Lab", "AB12");
        let renamed = RoomHandle::new("room-1", "Lab (renamed)", "AB12");
        let other = RoomHandle::new("room-2", "Lab", "AB12");
        assert_eq!(a, renamed);
        assert_ne!(a, other);
    }

    #[test]
    fn test_subscription_released_on_drop() {
        let source = Arc::new(CountingSource::default());
        let (sink, _rx) = EventSink::channel();

        let first = Subscription::acquire("counting", &source, &sink);
        let second = Subscription::acquire("counting", &source, &sink);
        assert_eq!(source.active.lock().unwrap().len(), 2);
        assert_eq!(first.source(), "counting");

        drop(first);
        assert_eq!(source.active.lock().unwrap().len(), 1);
        drop(second);
        assert!(source.active.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sink_reports_closed_receiver() {
        let (sink, rx) = EventSink::channel();
        assert!(sink.emit(SessionEvent::PingAcknowledged));
        drop(rx);
        assert!(!sink.emit(SessionEvent::PingAcknowledged));
    }

    #[test]
    fn test_collaborators_debug_hides_handles() {
        let debug = format!("{:?}", Collaborators::new());
        assert!(debug.contains("directory: false"));
    }
}
