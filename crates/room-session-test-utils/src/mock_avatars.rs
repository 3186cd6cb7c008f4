//! Mock avatar service.
//!
//! Tracks avatars with their owner and active flag. Policy starts `Enabled`.

use crate::registry::{lock, SinkRegistry};
use room_session::collaborators::{
    AvatarId, AvatarInfo, AvatarPolicy, AvatarService, EventSink, NotificationSource,
    SessionEvent, SubscriptionId,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
struct AvatarState {
    is_local: bool,
    active: bool,
}

#[derive(Debug)]
pub struct MockAvatarService {
    subscribers: SinkRegistry,
    policy: Mutex<AvatarPolicy>,
    policy_writes: AtomicUsize,
    avatars: Mutex<BTreeMap<u64, AvatarState>>,
}

impl Default for MockAvatarService {
    fn default() -> Self {
        Self {
            subscribers: SinkRegistry::default(),
            policy: Mutex::new(AvatarPolicy::Enabled),
            policy_writes: AtomicUsize::new(0),
            avatars: Mutex::new(BTreeMap::new()),
        }
    }
}

impl MockAvatarService {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an avatar without announcing it.
    pub fn insert(&self, id: u64, is_local: bool) {
        lock(&self.avatars).insert(
            id,
            AvatarState {
                is_local,
                active: true,
            },
        );
    }

    /// Register an avatar and fire `AvatarCreated`.
    pub fn spawn_avatar(&self, id: u64, is_local: bool) -> usize {
        self.insert(id, is_local);
        let info = AvatarInfo {
            id: AvatarId(id),
            is_local,
        };
        self.subscribers.emit(|| SessionEvent::AvatarCreated(info))
    }

    /// Whether the avatar exists and has not been deactivated.
    #[must_use]
    pub fn is_active(&self, id: u64) -> bool {
        lock(&self.avatars).get(&id).is_some_and(|a| a.active)
    }

    #[must_use]
    pub fn policy(&self) -> AvatarPolicy {
        *lock(&self.policy)
    }

    /// Number of `set_creation_policy` calls.
    #[must_use]
    pub fn policy_write_count(&self) -> usize {
        self.policy_writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl NotificationSource for MockAvatarService {
    fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        self.subscribers.subscribe(sink)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }
}

impl AvatarService for MockAvatarService {
    fn creation_policy(&self) -> AvatarPolicy {
        self.policy()
    }

    fn set_creation_policy(&self, policy: AvatarPolicy) {
        self.policy_writes.fetch_add(1, Ordering::SeqCst);
        *lock(&self.policy) = policy;
    }

    fn local_avatars(&self) -> Vec<AvatarId> {
        lock(&self.avatars)
            .iter()
            .filter(|(_, a)| a.is_local)
            .map(|(id, _)| AvatarId(*id))
            .collect()
    }

    fn deactivate(&self, avatar: AvatarId) {
        if let Some(state) = lock(&self.avatars).get_mut(&avatar.0) {
            state.active = false;
        }
    }
}
