//! Mock voice relay and peer connections.

use crate::registry::{lock, SinkRegistry};
use room_session::collaborators::{
    ConnectionId, EventSink, NotificationSource, PeerConnection, SessionEvent, SubscriptionId,
    VoiceRelay,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Peer connection that remembers the last `set_active` value.
#[derive(Debug)]
pub struct MockPeerConnection {
    id: ConnectionId,
    active: Mutex<Option<bool>>,
    writes: AtomicUsize,
}

impl MockPeerConnection {
    #[must_use]
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId(id),
            active: Mutex::new(None),
            writes: AtomicUsize::new(0),
        })
    }

    /// Last value passed to `set_active`, `None` if never written.
    #[must_use]
    pub fn active(&self) -> Option<bool> {
        *lock(&self.active)
    }

    /// Number of `set_active` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PeerConnection for MockPeerConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn set_active(&self, active: bool) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *lock(&self.active) = Some(active);
    }
}

/// Voice relay that announces connections on demand.
#[derive(Debug, Default)]
pub struct MockVoiceRelay {
    subscribers: SinkRegistry,
}

impl MockVoiceRelay {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Announce a peer connection. Returns how many subscribers accepted it.
    pub fn connect(&self, connection: &Arc<MockPeerConnection>) -> usize {
        let connection: Arc<dyn PeerConnection> = Arc::clone(connection) as Arc<dyn PeerConnection>;
        self.subscribers
            .emit(|| SessionEvent::PeerConnectionCreated(Arc::clone(&connection)))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl NotificationSource for MockVoiceRelay {
    fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        self.subscribers.subscribe(sink)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }
}

impl VoiceRelay for MockVoiceRelay {}
