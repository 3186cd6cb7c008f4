//! Post-join configuration.
//!
//! Reacts to session transitions by applying the voice, avatar and spawn
//! policies to the injected collaborators. Every action is idempotent:
//! hiding an already hidden avatar or re-activating an active connection
//! changes nothing.

use crate::collaborators::{
    AvatarInfo, AvatarPolicy, AvatarService, PeerConnection, RoomHandle, SpawnSubsystem,
};
use crate::role::Role;
use std::sync::Arc;
use tracing::{debug, info};

/// What prompted a configuration pass.
#[derive(Debug)]
pub enum Trigger<'a> {
    /// The session just joined a room.
    Join,
    /// The directory reported a room update. `current` is the room the
    /// session is joined to, if any.
    Update {
        room: &'a RoomHandle,
        current: Option<&'a RoomHandle>,
    },
    /// The voice relay created a peer connection.
    PeerConnection(Arc<dyn PeerConnection>),
    /// The avatar service created an avatar.
    AvatarCreated(AvatarInfo),
}

/// Applies voice, avatar and spawn policies.
pub struct PostJoinConfigurator {
    role: Role,
    voice_enabled: bool,
    avatar_hidden: bool,
    connections: Vec<Arc<dyn PeerConnection>>,
    avatars: Option<Arc<dyn AvatarService>>,
    spawner: Option<Arc<dyn SpawnSubsystem>>,
}

impl PostJoinConfigurator {
    #[must_use]
    pub fn new(
        role: Role,
        voice_enabled: bool,
        avatar_hidden: bool,
        avatars: Option<Arc<dyn AvatarService>>,
        spawner: Option<Arc<dyn SpawnSubsystem>>,
    ) -> Self {
        Self {
            role,
            voice_enabled,
            avatar_hidden,
            connections: Vec::new(),
            avatars,
            spawner,
        }
    }

    /// Run the actions for `trigger`.
    pub fn apply(&mut self, trigger: Trigger<'_>) {
        match trigger {
            Trigger::Join => self.on_join(),
            Trigger::Update { room, current } => self.on_update(room, current),
            Trigger::PeerConnection(connection) => self.on_peer_connection(connection),
            Trigger::AvatarCreated(avatar) => self.on_avatar_created(avatar),
        }
    }

    /// Disable host avatar creation before any room is joined.
    pub fn configure_avatar_visibility(&self) {
        if !self.hides_avatar() {
            return;
        }
        if let Some(avatars) = &self.avatars {
            apply_creation_policy(avatars.as_ref(), AvatarPolicy::Disabled);
        }
    }

    /// Flip host avatar visibility.
    ///
    /// Returns the new hidden state, or `None` for clients.
    pub fn toggle_host_avatar(&mut self) -> Option<bool> {
        if self.role != Role::Host {
            return None;
        }
        self.avatar_hidden = !self.avatar_hidden;
        if self.avatar_hidden {
            self.hide_host_avatar();
            info!(target: "room.session.configurator", "Host avatar hidden");
        } else {
            if let Some(avatars) = &self.avatars {
                apply_creation_policy(avatars.as_ref(), AvatarPolicy::Enabled);
            }
            info!(target: "room.session.configurator", "Host avatar shown");
        }
        Some(self.avatar_hidden)
    }

    /// Change the voice policy and re-apply it to every tracked connection.
    pub fn set_voice_enabled(&mut self, enabled: bool) {
        self.voice_enabled = enabled;
        info!(
            target: "room.session.configurator",
            voice_enabled = enabled,
            connections = self.connections.len(),
            "Voice policy changed"
        );
        self.apply_voice_policy();
    }

    #[must_use]
    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    #[must_use]
    pub fn avatar_hidden(&self) -> bool {
        self.avatar_hidden
    }

    #[must_use]
    pub fn tracked_connections(&self) -> usize {
        self.connections.len()
    }

    fn on_join(&mut self) {
        self.hide_host_avatar();
        self.apply_voice_policy();
        if self.role == Role::Host {
            if let Some(spawner) = &self.spawner {
                spawner.set_enabled(true);
                debug!(target: "room.session.configurator", "Spawn subsystem enabled");
            }
        }
    }

    fn on_update(&mut self, room: &RoomHandle, current: Option<&RoomHandle>) {
        // Stale notification from a superseded room
        if current != Some(room) {
            debug!(
                target: "room.session.configurator",
                room_id = %room.id,
                "Ignoring update for a room that is not the current room"
            );
            return;
        }
        self.hide_host_avatar();
    }

    fn on_peer_connection(&mut self, connection: Arc<dyn PeerConnection>) {
        let id = connection.id();
        if !self.connections.iter().any(|c| c.id() == id) {
            self.connections.push(connection);
        }
        debug!(
            target: "room.session.configurator",
            connection_id = id.0,
            connections = self.connections.len(),
            "Peer connection tracked"
        );
        self.apply_voice_policy();
    }

    fn on_avatar_created(&mut self, avatar: AvatarInfo) {
        if self.hides_avatar() && avatar.is_local {
            if let Some(avatars) = &self.avatars {
                avatars.deactivate(avatar.id);
                debug!(
                    target: "room.session.configurator",
                    avatar_id = avatar.id.0,
                    "Deactivated newly created host avatar"
                );
            }
        }
    }

    fn hides_avatar(&self) -> bool {
        self.role == Role::Host && self.avatar_hidden
    }

    fn hide_host_avatar(&self) {
        if !self.hides_avatar() {
            return;
        }
        let Some(avatars) = &self.avatars else {
            return;
        };
        apply_creation_policy(avatars.as_ref(), AvatarPolicy::Disabled);
        for avatar in avatars.local_avatars() {
            avatars.deactivate(avatar);
        }
    }

    fn apply_voice_policy(&self) {
        for connection in &self.connections {
            connection.set_active(self.voice_enabled);
        }
    }
}

/// Write the avatar creation policy only when it differs from the current one.
fn apply_creation_policy(avatars: &dyn AvatarService, policy: AvatarPolicy) {
    let current = avatars.creation_policy();
    if current == policy {
        return;
    }
    avatars.set_creation_policy(policy);
    debug!(
        target: "room.session.configurator",
        from = ?current,
        to = ?policy,
        "Avatar creation policy changed"
    );
}

impl std::fmt::Debug for PostJoinConfigurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostJoinConfigurator")
            .field("role", &self.role)
            .field("voice_enabled", &self.voice_enabled)
            .field("avatar_hidden", &self.avatar_hidden)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::collaborators::{AvatarId, ConnectionId, EventSink, NotificationSource, SubscriptionId};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Connection {
        id: ConnectionId,
        active: Mutex<Option<bool>>,
    }

    impl Connection {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId(id),
                active: Mutex::new(None),
            })
        }

        fn active(&self) -> Option<bool> {
            *self.active.lock().unwrap()
        }
    }

    impl PeerConnection for Connection {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn set_active(&self, active: bool) {
            *self.active.lock().unwrap() = Some(active);
        }
    }

    struct Avatars {
        policy: Mutex<AvatarPolicy>,
        locals: Vec<AvatarId>,
        deactivated: Mutex<Vec<AvatarId>>,
    }

    impl Avatars {
        fn with_locals(locals: Vec<AvatarId>) -> Arc<Self> {
            Arc::new(Self {
                policy: Mutex::new(AvatarPolicy::Enabled),
                locals,
                deactivated: Mutex::new(Vec::new()),
            })
        }
    }

    impl NotificationSource for Avatars {
        fn subscribe(&self, _sink: EventSink) -> SubscriptionId {
            SubscriptionId(0)
        }
        fn unsubscribe(&self, _id: SubscriptionId) {}
    }

    impl AvatarService for Avatars {
        fn creation_policy(&self) -> AvatarPolicy {
            *self.policy.lock().unwrap()
        }
        fn set_creation_policy(&self, policy: AvatarPolicy) {
            *self.policy.lock().unwrap() = policy;
        }
        fn local_avatars(&self) -> Vec<AvatarId> {
            self.locals.clone()
        }
        fn deactivate(&self, avatar: AvatarId) {
            self.deactivated.lock().unwrap().push(avatar);
        }
    }

    #[derive(Default)]
    struct Spawner {
        enabled: AtomicBool,
        calls: AtomicU32,
    }

    impl SpawnSubsystem for Spawner {
        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn host_configurator(avatars: &Arc<Avatars>, spawner: &Arc<Spawner>) -> PostJoinConfigurator {
        PostJoinConfigurator::new(
            Role::Host,
            true,
            true,
            Some(Arc::clone(avatars) as Arc<dyn AvatarService>),
            Some(Arc::clone(spawner) as Arc<dyn SpawnSubsystem>),
        )
    }

    #[test]
    fn test_host_join_hides_avatar_and_enables_spawner() {
        let avatars = Avatars::with_locals(vec![AvatarId(7)]);
        let spawner = Arc::new(Spawner::default());
        let mut configurator = host_configurator(&avatars, &spawner);

        configurator.apply(Trigger::Join);

        assert_eq!(avatars.creation_policy(), AvatarPolicy::Disabled);
        assert_eq!(*avatars.deactivated.lock().unwrap(), vec![AvatarId(7)]);
        assert!(spawner.enabled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_client_join_leaves_avatar_and_spawner_alone() {
        let avatars = Avatars::with_locals(vec![AvatarId(1)]);
        let spawner = Arc::new(Spawner::default());
        let mut configurator = PostJoinConfigurator::new(
            Role::Client,
            true,
            true,
            Some(Arc::clone(&avatars) as Arc<dyn AvatarService>),
            Some(Arc::clone(&spawner) as Arc<dyn SpawnSubsystem>),
        );

        configurator.apply(Trigger::Join);

        assert_eq!(avatars.creation_policy(), AvatarPolicy::Enabled);
        assert!(avatars.deactivated.lock().unwrap().is_empty());
        assert_eq!(spawner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(configurator.toggle_host_avatar(), None);
    }

    #[test]
    fn test_peer_connection_applies_policy_to_all() {
        let mut configurator = PostJoinConfigurator::new(Role::Client, false, true, None, None);
        let first = Connection::new(1);
        let second = Connection::new(2);

        configurator.apply(Trigger::PeerConnection(first.clone()));
        configurator.apply(Trigger::PeerConnection(second.clone()));

        assert_eq!(first.active(), Some(false));
        assert_eq!(second.active(), Some(false));

        configurator.set_voice_enabled(true);
        assert_eq!(first.active(), Some(true));
        assert_eq!(second.active(), Some(true));
    }

    #[test]
    fn test_repeated_peer_connection_is_idempotent() {
        let mut configurator = PostJoinConfigurator::new(Role::Host, true, true, None, None);
        let connection = Connection::new(42);

        configurator.apply(Trigger::PeerConnection(connection.clone()));
        let once = connection.active();
        configurator.apply(Trigger::PeerConnection(connection.clone()));

        assert_eq!(connection.active(), once);
        assert_eq!(configurator.tracked_connections(), 1);
    }

    #[test]
    fn test_update_for_stale_room_is_ignored() {
        let avatars = Avatars::with_locals(vec![AvatarId(3)]);
        let spawner = Arc::new(Spawner::default());
        let mut configurator = host_configurator(&avatars, &spawner);
        let current = RoomHandle::new("room-2", "Lab", "CD34");
        let stale = RoomHandle::new("room-1", "Lab", "AB12");

        configurator.apply(Trigger::Update {
            room: &stale,
            current: Some(&current),
        });
        assert!(avatars.deactivated.lock().unwrap().is_empty());

        configurator.apply(Trigger::Update {
            room: &current,
            current: Some(&current),
        });
        assert_eq!(*avatars.deactivated.lock().unwrap(), vec![AvatarId(3)]);
    }

    #[test]
    fn test_new_local_avatar_deactivated_for_hidden_host() {
        let avatars = Avatars::with_locals(Vec::new());
        let spawner = Arc::new(Spawner::default());
        let mut configurator = host_configurator(&avatars, &spawner);

        configurator.apply(Trigger::AvatarCreated(AvatarInfo {
            id: AvatarId(9),
            is_local: false,
        }));
        configurator.apply(Trigger::AvatarCreated(AvatarInfo {
            id: AvatarId(10),
            is_local: true,
        }));

        assert_eq!(*avatars.deactivated.lock().unwrap(), vec![AvatarId(10)]);
    }

    #[test]
    fn test_toggle_host_avatar() {
        let avatars = Avatars::with_locals(vec![AvatarId(5)]);
        let spawner = Arc::new(Spawner::default());
        let mut configurator = host_configurator(&avatars, &spawner);
        configurator.configure_avatar_visibility();
        assert_eq!(avatars.creation_policy(), AvatarPolicy::Disabled);

        assert_eq!(configurator.toggle_host_avatar(), Some(false));
        assert_eq!(avatars.creation_policy(), AvatarPolicy::Enabled);
        assert!(!configurator.avatar_hidden());

        assert_eq!(configurator.toggle_host_avatar(), Some(true));
        assert_eq!(avatars.creation_policy(), AvatarPolicy::Disabled);
        assert_eq!(*avatars.deactivated.lock().unwrap(), vec![AvatarId(5)]);
    }
}
