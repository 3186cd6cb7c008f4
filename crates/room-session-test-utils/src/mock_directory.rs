//! Mock room directory.
//!
//! Records every call and lets tests push notifications to subscribers.
//! Optional scripted behaviour:
//! - answer `discover_rooms` with a fixed room list
//! - answer `ping` with `PingAcknowledged`
//! - answer joins with `Joined` or `JoinRejected`
//!
//! # Example
//!
//! ```rust,ignore
//! let directory = MockDirectory::new();
//! directory.acknowledge_pings(true);
//! directory.respond_to_discovery(vec![candidate("Lab", "AB12")]);
//! ```

use crate::registry::{lock, SinkRegistry};
use room_session::collaborators::{
    DirectoryClient, EventSink, NotificationSource, Rejection, RoomCandidate, RoomHandle,
    SessionEvent, SubscriptionId, TimeoutBehaviour,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A call made on the mock directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    CreateAndJoin { room_name: String, public: bool },
    DiscoverRooms,
    JoinByCode(String),
    Ping,
    SetTimeoutBehaviour(TimeoutBehaviour),
}

/// Scripted answer to a join request.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Accept(RoomHandle),
    Reject(String),
}

/// Mock directory client.
#[derive(Debug, Default)]
pub struct MockDirectory {
    calls: Mutex<Vec<DirectoryCall>>,
    subscribers: SinkRegistry,
    acknowledge_pings: AtomicBool,
    discovery_response: Mutex<Option<Vec<RoomCandidate>>>,
    join_outcome: Mutex<Option<JoinOutcome>>,
}

impl MockDirectory {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every ping with `PingAcknowledged`.
    pub fn acknowledge_pings(&self, enabled: bool) {
        self.acknowledge_pings.store(enabled, Ordering::SeqCst);
    }

    /// Answer every discovery query with `rooms`.
    pub fn respond_to_discovery(&self, rooms: Vec<RoomCandidate>) {
        *lock(&self.discovery_response) = Some(rooms);
    }

    /// Answer every create or join with `outcome`.
    pub fn respond_to_joins(&self, outcome: JoinOutcome) {
        *lock(&self.join_outcome) = Some(outcome);
    }

    /// Push a notification to every subscriber. Returns how many accepted it.
    pub fn emit(&self, event: SessionEvent) -> usize {
        // SessionEvent is not Clone; rebuild it per subscriber.
        match event {
            SessionEvent::RoomsDiscovered(rooms) => self
                .subscribers
                .emit(|| SessionEvent::RoomsDiscovered(rooms.clone())),
            SessionEvent::Joined(room) => self
                .subscribers
                .emit(|| SessionEvent::Joined(room.clone())),
            SessionEvent::JoinRejected(rejection) => self
                .subscribers
                .emit(|| SessionEvent::JoinRejected(rejection.clone())),
            SessionEvent::RoomUpdated(room) => self
                .subscribers
                .emit(|| SessionEvent::RoomUpdated(room.clone())),
            SessionEvent::PingAcknowledged => {
                self.subscribers.emit(|| SessionEvent::PingAcknowledged)
            }
            SessionEvent::PeerConnectionCreated(connection) => self
                .subscribers
                .emit(|| SessionEvent::PeerConnectionCreated(Arc::clone(&connection))),
            SessionEvent::AvatarCreated(avatar) => self
                .subscribers
                .emit(|| SessionEvent::AvatarCreated(avatar)),
        }
    }

    /// Every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DirectoryCall> {
        lock(&self.calls).clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    #[must_use]
    pub fn ping_count(&self) -> usize {
        self.count(|c| matches!(c, DirectoryCall::Ping))
    }

    #[must_use]
    pub fn discovery_count(&self) -> usize {
        self.count(|c| matches!(c, DirectoryCall::DiscoverRooms))
    }

    #[must_use]
    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, DirectoryCall::CreateAndJoin { .. }))
    }

    /// Join codes passed to `join_by_code`, in order.
    #[must_use]
    pub fn joined_codes(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                DirectoryCall::JoinByCode(code) => Some(code.clone()),
                _ => None,
            })
            .collect()
    }

    /// Timeout behaviour most recently configured by the session.
    #[must_use]
    pub fn timeout_behaviour(&self) -> Option<TimeoutBehaviour> {
        lock(&self.calls).iter().rev().find_map(|c| match c {
            DirectoryCall::SetTimeoutBehaviour(b) => Some(*b),
            _ => None,
        })
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn count(&self, predicate: impl Fn(&DirectoryCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: DirectoryCall) {
        debug!(target: "room.test.mock_directory", ?call, "Directory call");
        lock(&self.calls).push(call);
    }

    fn answer_join(&self) {
        let outcome = lock(&self.join_outcome).clone();
        match outcome {
            Some(JoinOutcome::Accept(room)) => {
                self.emit(SessionEvent::Joined(room));
            }
            Some(JoinOutcome::Reject(reason)) => {
                self.emit(SessionEvent::JoinRejected(Rejection::new(reason)));
            }
            None => {}
        }
    }
}

impl NotificationSource for MockDirectory {
    fn subscribe(&self, sink: EventSink) -> SubscriptionId {
        self.subscribers.subscribe(sink)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }
}

impl DirectoryClient for MockDirectory {
    fn create_and_join(&self, room_name: &str, public: bool) {
        self.record(DirectoryCall::CreateAndJoin {
            room_name: room_name.to_string(),
            public,
        });
        self.answer_join();
    }

    fn discover_rooms(&self) {
        self.record(DirectoryCall::DiscoverRooms);
        let response = lock(&self.discovery_response).clone();
        if let Some(rooms) = response {
            self.emit(SessionEvent::RoomsDiscovered(rooms));
        }
    }

    fn join_by_code(&self, join_code: &str) {
        self.record(DirectoryCall::JoinByCode(join_code.to_string()));
        self.answer_join();
    }

    fn ping(&self) {
        self.record(DirectoryCall::Ping);
        if self.acknowledge_pings.load(Ordering::SeqCst) {
            self.emit(SessionEvent::PingAcknowledged);
        }
    }

    fn set_timeout_behaviour(&self, behaviour: TimeoutBehaviour) {
        self.record(DirectoryCall::SetTimeoutBehaviour(behaviour));
    }
}
